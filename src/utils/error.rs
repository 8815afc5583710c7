use std::time::Duration;
use thiserror::Error;

/// Failure to turn a source descriptor into a readable stream. Fatal to a scan.
#[derive(Error, Debug)]
pub enum SourceOpenError {
    #[error("Empty source descriptor")]
    EmptyDescriptor,

    #[error("Invalid source descriptor '{descriptor}': {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    #[error("Unsupported transport scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Unable to reach {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to open file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP source {url} answered with status {status}")]
    HttpStatus { url: String, status: u16 },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed YAML payload: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed XML payload: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Format '{0}' cannot be used to decode input")]
    UnsupportedFormat(String),
}

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Unknown encoding format: {0}")]
    UnknownFormat(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML encoding failed: {0}")]
    Xml(String),
}

/// One entry of a scan report's error sequence.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    SourceOpen(#[from] SourceOpenError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Error reading source stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid coordinates data for customer [{user_id}] {name}")]
    Validation { user_id: i64, name: String },

    #[error("No record received for {idle:?} before the source signalled its end; remaining records, if any, were dropped")]
    IdleTimeout { idle: Duration },

    #[error("Scan task failed: {0}")]
    Task(String),

    #[error("Invalid scan configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::SourceOpen(_) | ScanError::InvalidConfig { .. })
    }
}

#[derive(Error, Debug)]
pub enum InviteError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Output encoding error: {0}")]
    EncodingError(#[from] EncodingError),

    #[error("Source error: {0}")]
    SourceError(#[from] SourceOpenError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl InviteError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            InviteError::ConfigError { .. }
            | InviteError::ConfigValidationError { .. }
            | InviteError::InvalidConfigValueError { .. }
            | InviteError::MissingConfigError { .. } => ErrorSeverity::Medium,
            InviteError::SourceError(_) | InviteError::EncodingError(_) => ErrorSeverity::High,
            InviteError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            InviteError::ConfigError { .. } | InviteError::ConfigValidationError { .. } => {
                "Check the configuration file syntax and key names"
            }
            InviteError::InvalidConfigValueError { .. } => {
                "Fix the reported value and run again, see --help for accepted ranges"
            }
            InviteError::MissingConfigError { .. } => {
                "Provide the missing value on the command line or in the config file"
            }
            InviteError::SourceError(_) => {
                "Verify the input path or address is reachable from this host"
            }
            InviteError::EncodingError(_) => "Choose one of the supported output formats",
            InviteError::IoError(_) => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            InviteError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid {}: {}", field, reason)
            }
            InviteError::MissingConfigError { field } => format!("Missing {}", field),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InviteError>;
