pub mod aggregator;
pub mod classifier;
pub mod engine;
pub mod orchestrator;
pub mod producer;

pub use crate::domain::model::{ClassificationOutcome, CustomerRecord, ResultBucketSet, ScanReport};
pub use crate::domain::ports::{SourceDescriptor, SourceHandle, TransportOpener};
pub use crate::utils::error::Result;
