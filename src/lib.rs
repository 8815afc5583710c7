pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::RunSettings, CliConfig};

pub use adapters::codec::Format;
pub use adapters::transport::SchemeOpener;
pub use config::{FileConfig, ScanConfig};
pub use core::{engine::InviteEngine, orchestrator::ScanOrchestrator};
pub use domain::model::{OutputMode, ReadMode, ScanReport, Termination};
pub use utils::error::{InviteError, Result, ScanError};
