#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::codec::Format;
use crate::domain::distance::{Coordinates, DistanceUnit};
use crate::domain::model::{OutputMode, ReadMode};
use crate::domain::ports::SourceDescriptor;
use crate::utils::error::{InviteError, Result};
use crate::utils::validation::{
    validate_min_duration, validate_positive_number, validate_range, validate_strictly_positive,
    Validate,
};
use std::time::Duration;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::FileConfig;

pub const DEFAULT_LATITUDE: f64 = 53.339428;
pub const DEFAULT_LONGITUDE: f64 = -6.257664;
pub const DEFAULT_MAX_DISTANCE: f64 = 100.0;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Everything one scan needs. Built once by the caller and only read afterwards.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub source: SourceDescriptor,
    pub reference: Coordinates,
    pub max_distance: f64,
    pub unit: DistanceUnit,
    pub input_format: Format,
    pub read_mode: ReadMode,
    pub output_mode: OutputMode,
    /// Size of the classification worker pool.
    pub workers: usize,
    /// Capacity of the record channel between producer and consumer loop.
    pub queue_capacity: usize,
    /// Safety bound: the scan stops if no record arrives for this long.
    pub idle_timeout: Duration,
}

impl ScanConfig {
    pub fn new(source: SourceDescriptor) -> Self {
        Self {
            source,
            reference: Coordinates::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
            max_distance: DEFAULT_MAX_DISTANCE,
            unit: DistanceUnit::default(),
            input_format: Format::Json,
            read_mode: ReadMode::default(),
            output_mode: OutputMode::default(),
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_reference(mut self, latitude: f64, longitude: f64) -> Self {
        self.reference = Coordinates::new(latitude, longitude);
        self
    }

    pub fn with_max_distance(mut self, max_distance: f64, unit: DistanceUnit) -> Self {
        self.max_distance = max_distance;
        self.unit = unit;
        self
    }

    pub fn with_input_format(mut self, format: Format) -> Self {
        self.input_format = format;
        self
    }

    pub fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

impl Validate for ScanConfig {
    fn validate(&self) -> Result<()> {
        validate_range("latitude", self.reference.latitude, -90.0, 90.0)?;
        validate_range("longitude", self.reference.longitude, -180.0, 180.0)?;
        validate_strictly_positive("distance", self.max_distance)?;

        if !self.input_format.is_input_format() {
            return Err(InviteError::InvalidConfigValueError {
                field: "in-enc".to_string(),
                value: self.input_format.to_string(),
                reason: format!(
                    "Input encoding must be one of: {}",
                    Format::INPUT.map(|f| f.as_str()).join(", ")
                ),
            });
        }

        validate_positive_number("workers", self.workers, 1)?;
        validate_positive_number("queue_capacity", self.queue_capacity, 1)?;
        validate_min_duration("idle_timeout", self.idle_timeout, Duration::from_millis(1))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base() -> ScanConfig {
        ScanConfig::new(SourceDescriptor::File(PathBuf::from("customers.txt")))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = base();
        assert!(config.validate().is_ok());
        assert_eq!(config.unit, DistanceUnit::Kilometers);
        assert_eq!(config.read_mode, ReadMode::PerLine);
        assert_eq!(config.output_mode, OutputMode::Simple);
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(base().with_reference(95.0, 0.0).validate().is_err());
        assert!(base().with_reference(0.0, -181.0).validate().is_err());
        assert!(base()
            .with_max_distance(0.0, DistanceUnit::Miles)
            .validate()
            .is_err());
        assert!(base().with_input_format(Format::Text).validate().is_err());
        assert!(base().with_workers(0).validate().is_err());
        assert!(base().with_queue_capacity(0).validate().is_err());
        assert!(base()
            .with_idle_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
