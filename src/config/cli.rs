use crate::adapters::codec::Format;
use crate::config::toml_config::FileConfig;
use crate::config::{
    default_workers, ScanConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_LATITUDE, DEFAULT_LONGITUDE,
    DEFAULT_MAX_DISTANCE, DEFAULT_QUEUE_CAPACITY,
};
use crate::domain::distance::DistanceUnit;
use crate::domain::model::{OutputMode, ReadMode};
use crate::domain::ports::SourceDescriptor;
use crate::utils::error::{InviteError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_required_field, Validate};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Command-line flags. Unset flags fall back to the config file, then to the
/// built-in defaults shown in the help text.
#[derive(Debug, Clone, Parser)]
#[command(name = "invite-scan")]
#[command(about = "Lists customers within a given distance of a reference point")]
pub struct CliConfig {
    /// Customer source: a file path or a tcp://, udp://, http(s):// or file:// URL
    #[arg(long)]
    pub input: Option<String>,

    /// Reference latitude [default: 53.339428]
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Reference longitude [default: -6.257664]
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Maximum distance from the reference point [default: 100]
    #[arg(long)]
    pub distance: Option<f64>,

    /// Distance unit: K, M or N [default: K]
    #[arg(long)]
    pub unit: Option<String>,

    /// Input encoding: json, yaml or xml [default: json]
    #[arg(long = "in-enc")]
    pub in_enc: Option<String>,

    /// Output encoding: json, yaml, xml or text [default: text]
    #[arg(long = "out-enc")]
    pub out_enc: Option<String>,

    /// Read one record per line (true) or one document holding a list (false) [default: true]
    #[arg(long = "per-line-input", action = ArgAction::Set, value_name = "BOOL")]
    pub per_line_input: Option<bool>,

    /// Also report the customers outside the distance
    #[arg(long)]
    pub detailed: bool,

    /// Only print the result, without per-error details
    #[arg(long)]
    pub silent: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    /// Number of classification workers [default: available CPUs]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Capacity of the record queue [default: 1024]
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Stop the scan if the source stays silent this long; udp:// sources always
    /// end this way and it is not reported as an error [default: 10]
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Path to a TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Log process memory and CPU usage per phase")]
    pub monitor: bool,
}

/// What the binary needs once flags and file settings are merged.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub scan: ScanConfig,
    pub output_format: Format,
    pub silent: bool,
}

impl CliConfig {
    /// Merges flags over the optional file settings and validates the result.
    pub fn resolve(&self, file: Option<&FileConfig>) -> Result<RunSettings> {
        let file = file.cloned().unwrap_or_default();

        let input = self.input.clone().or(file.source.input);
        let input = validate_required_field("input", &input)?;
        validate_non_empty_string("input", input)?;
        let source = SourceDescriptor::parse(input).map_err(|e| {
            InviteError::InvalidConfigValueError {
                field: "input".to_string(),
                value: input.clone(),
                reason: e.to_string(),
            }
        })?;

        let unit = match &self.unit {
            Some(raw) => DistanceUnit::from_str(raw).map_err(|reason| {
                InviteError::InvalidConfigValueError {
                    field: "unit".to_string(),
                    value: raw.clone(),
                    reason,
                }
            })?,
            None => file.scan.unit.unwrap_or_default(),
        };
        let input_format = parse_format("in-enc", self.in_enc.as_deref())?
            .or(file.source.format)
            .unwrap_or(Format::Json);
        let output_format = parse_format("out-enc", self.out_enc.as_deref())?
            .or(file.output.format)
            .unwrap_or(Format::Text);

        let read_mode = match self.per_line_input {
            Some(true) => ReadMode::PerLine,
            Some(false) => ReadMode::WholeDocument,
            None => file.source.read_mode.unwrap_or_default(),
        };
        let output_mode = if self.detailed || file.output.detailed.unwrap_or(false) {
            OutputMode::Detailed
        } else {
            OutputMode::Simple
        };
        let idle_timeout = self
            .idle_timeout_secs
            .or(file.scan.idle_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_IDLE_TIMEOUT);

        let scan = ScanConfig::new(source)
            .with_reference(
                self.latitude
                    .or(file.reference.latitude)
                    .unwrap_or(DEFAULT_LATITUDE),
                self.longitude
                    .or(file.reference.longitude)
                    .unwrap_or(DEFAULT_LONGITUDE),
            )
            .with_max_distance(
                self.distance
                    .or(file.scan.distance)
                    .unwrap_or(DEFAULT_MAX_DISTANCE),
                unit,
            )
            .with_input_format(input_format)
            .with_read_mode(read_mode)
            .with_output_mode(output_mode)
            .with_workers(self.workers.or(file.scan.workers).unwrap_or_else(default_workers))
            .with_queue_capacity(
                self.queue_capacity
                    .or(file.scan.queue_capacity)
                    .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            )
            .with_idle_timeout(idle_timeout);
        scan.validate()?;

        Ok(RunSettings {
            scan,
            output_format,
            silent: self.silent || file.output.silent.unwrap_or(false),
        })
    }
}

fn parse_format(field: &str, raw: Option<&str>) -> Result<Option<Format>> {
    raw.map(|value| {
        Format::from_str(value).map_err(|e| InviteError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!(
                "{}, expected one of: {}",
                e,
                Format::OUTPUT.map(|f| f.as_str()).join(", ")
            ),
        })
    })
    .transpose()
}
