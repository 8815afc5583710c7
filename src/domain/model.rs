use crate::utils::error::ScanError;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// A location-tagged customer as decoded from the source.
///
/// Coordinates keep their textual form; they are only parsed when the record is
/// classified, so malformed values survive decoding and surface as validation
/// errors instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(default, alias = "user-id")]
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "coordinate_text")]
    pub latitude: String,
    #[serde(default, deserialize_with = "coordinate_text")]
    pub longitude: String,
}

impl CustomerRecord {
    pub fn parsed_latitude(&self) -> Option<f64> {
        parse_coordinate(&self.latitude)
    }

    pub fn parsed_longitude(&self) -> Option<f64> {
        parse_coordinate(&self.longitude)
    }

    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            user_id: self.user_id,
            name: self.name.clone(),
        }
    }
}

// "NaN" and "inf" parse as f64 but can never be classified
fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whole-document input shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecordList {
    #[serde(default)]
    pub customers: Vec<CustomerRecord>,
}

/// Accepts either a quoted string or a bare number and keeps its text.
fn coordinate_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct CoordinateVisitor;

    impl<'de> de::Visitor<'de> for CoordinateVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a coordinate as string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
            Ok(v)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<String, E> {
            Ok(String::new())
        }

        // XML elements arrive as a map holding their text content
        fn visit_map<A>(self, mut map: A) -> std::result::Result<String, A::Error>
        where
            A: de::MapAccess<'de>,
        {
            let mut text = String::new();
            while let Some(key) = map.next_key::<String>()? {
                let value: String = map.next_value()?;
                if key == "$text" || key == "$value" {
                    text = value;
                }
            }
            Ok(text)
        }
    }

    deserializer.deserialize_any(CoordinateVisitor)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub user_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationOutcome {
    Included(CustomerSummary),
    Excluded(CustomerSummary),
}

impl ClassificationOutcome {
    pub fn is_included(&self) -> bool {
        matches!(self, ClassificationOutcome::Included(_))
    }

    pub fn summary(&self) -> &CustomerSummary {
        match self {
            ClassificationOutcome::Included(s) | ClassificationOutcome::Excluded(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultBucketSet {
    Simple {
        #[serde(rename = "customers_list")]
        invited: Vec<CustomerSummary>,
    },
    Detailed {
        #[serde(rename = "customers_list")]
        invited: Vec<CustomerSummary>,
        #[serde(rename = "exclusions_list")]
        excluded: Vec<CustomerSummary>,
    },
}

impl ResultBucketSet {
    pub fn empty(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Simple => ResultBucketSet::Simple {
                invited: Vec::new(),
            },
            OutputMode::Detailed => ResultBucketSet::Detailed {
                invited: Vec::new(),
                excluded: Vec::new(),
            },
        }
    }

    pub fn invited(&self) -> &[CustomerSummary] {
        match self {
            ResultBucketSet::Simple { invited } | ResultBucketSet::Detailed { invited, .. } => {
                invited
            }
        }
    }

    /// `None` in simple mode, where excluded records are not retained.
    pub fn excluded(&self) -> Option<&[CustomerSummary]> {
        match self {
            ResultBucketSet::Simple { .. } => None,
            ResultBucketSet::Detailed { excluded, .. } => Some(excluded),
        }
    }

    pub fn is_detailed(&self) -> bool {
        matches!(self, ResultBucketSet::Detailed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Simple,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    #[default]
    PerLine,
    WholeDocument,
}

/// Why the consumer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The producer closed the record channel.
    EndOfStream,
    /// The idle window elapsed while the producer was still attached.
    IdleTimeout,
    /// The source could not be opened; nothing ran.
    SourceUnavailable,
    /// The config failed validation; the source was never opened.
    InvalidConfig,
}

#[derive(Debug)]
pub struct ScanReport {
    pub buckets: ResultBucketSet,
    pub errors: Vec<ScanError>,
    pub completed: bool,
    pub termination: Termination,
    pub records_received: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coordinates_keep_text() {
        let record: CustomerRecord = serde_json::from_str(
            r#"{"user_id": 3, "name": "Jack Enright", "latitude": 52.2559432, "longitude": "-7.1048927"}"#,
        )
        .unwrap();
        assert_eq!(record.latitude, "52.2559432");
        assert_eq!(record.longitude, "-7.1048927");
        assert_eq!(record.parsed_latitude(), Some(52.2559432));
    }

    #[test]
    fn test_missing_fields_default() {
        let record: CustomerRecord = serde_json::from_str(r#"{"name": "Nobody"}"#).unwrap();
        assert_eq!(record.user_id, 0);
        assert!(record.latitude.is_empty());
        assert_eq!(record.parsed_latitude(), None);
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let record = CustomerRecord {
            latitude: "NaN".to_string(),
            longitude: "inf".to_string(),
            ..Default::default()
        };
        assert_eq!(record.parsed_latitude(), None);
        assert_eq!(record.parsed_longitude(), None);
    }

    #[test]
    fn test_empty_bucket_set_matches_mode() {
        assert!(!ResultBucketSet::empty(OutputMode::Simple).is_detailed());
        let detailed = ResultBucketSet::empty(OutputMode::Detailed);
        assert!(detailed.is_detailed());
        assert_eq!(detailed.excluded(), Some(&[][..]));
    }
}
