use crate::domain::model::{CustomerRecord, CustomerRecordList, CustomerSummary, ResultBucketSet};
use crate::utils::error::{DecodeError, EncodingError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
    Xml,
    Text,
}

impl Format {
    pub const INPUT: [Format; 3] = [Format::Json, Format::Yaml, Format::Xml];
    pub const OUTPUT: [Format; 4] = [Format::Text, Format::Json, Format::Yaml, Format::Xml];

    pub fn is_input_format(&self) -> bool {
        !matches!(self, Format::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Xml => "xml",
            Format::Text => "text",
        }
    }
}

impl FromStr for Format {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "xml" => Ok(Format::Xml),
            "text" => Ok(Format::Text),
            _ => Err(EncodingError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T, DecodeError> {
    match format {
        Format::Json => Ok(serde_json::from_slice(data)?),
        Format::Yaml => Ok(serde_yaml::from_slice(data)?),
        Format::Xml => Ok(quick_xml::de::from_reader(data)?),
        Format::Text => Err(DecodeError::UnsupportedFormat(format.to_string())),
    }
}

pub fn decode_record(data: &[u8], format: Format) -> Result<CustomerRecord, DecodeError> {
    decode(data, format)
}

pub fn decode_record_list(data: &[u8], format: Format) -> Result<CustomerRecordList, DecodeError> {
    decode(data, format)
}

pub fn encode_record(record: &CustomerRecord, format: Format) -> Result<Vec<u8>, EncodingError> {
    match format {
        Format::Json => Ok(serde_json::to_vec(record)?),
        Format::Yaml => Ok(serde_yaml::to_string(record)?.into_bytes()),
        Format::Xml => quick_xml::se::to_string_with_root("CustomerOffice", &XmlRecord::from(record))
            .map(String::into_bytes)
            .map_err(|e| EncodingError::Xml(e.to_string())),
        Format::Text => Err(EncodingError::UnknownFormat(format.to_string())),
    }
}

#[derive(Serialize)]
struct XmlRecord<'a> {
    #[serde(rename = "user-id")]
    user_id: i64,
    name: &'a str,
    latitude: &'a str,
    longitude: &'a str,
}

impl<'a> From<&'a CustomerRecord> for XmlRecord<'a> {
    fn from(record: &'a CustomerRecord) -> Self {
        Self {
            user_id: record.user_id,
            name: &record.name,
            latitude: &record.latitude,
            longitude: &record.longitude,
        }
    }
}

// XML uses dashed element names, unlike the JSON/YAML keys.
#[derive(Serialize)]
struct XmlCustomer<'a> {
    #[serde(rename = "user-id")]
    user_id: i64,
    name: &'a str,
}

#[derive(Serialize)]
struct XmlInviteList<'a> {
    #[serde(rename = "customers-list")]
    invited: Vec<XmlCustomer<'a>>,
}

#[derive(Serialize)]
struct XmlCompleteInviteList<'a> {
    #[serde(rename = "customers-list")]
    invited: Vec<XmlCustomer<'a>>,
    #[serde(rename = "exclusions-list")]
    excluded: Vec<XmlCustomer<'a>>,
}

fn xml_entries(list: &[CustomerSummary]) -> Vec<XmlCustomer<'_>> {
    list.iter()
        .map(|c| XmlCustomer {
            user_id: c.user_id,
            name: &c.name,
        })
        .collect()
}

fn encode_xml(buckets: &ResultBucketSet) -> Result<Vec<u8>, EncodingError> {
    let encoded = match buckets {
        ResultBucketSet::Simple { invited } => quick_xml::se::to_string_with_root(
            "InviteList",
            &XmlInviteList {
                invited: xml_entries(invited),
            },
        ),
        ResultBucketSet::Detailed { invited, excluded } => quick_xml::se::to_string_with_root(
            "CompleteInviteList",
            &XmlCompleteInviteList {
                invited: xml_entries(invited),
                excluded: xml_entries(excluded),
            },
        ),
    };
    encoded
        .map(String::into_bytes)
        .map_err(|e| EncodingError::Xml(e.to_string()))
}

fn text_section(out: &mut String, header: &str, list: &[CustomerSummary], placeholder: &str) {
    out.push_str(header);
    out.push('\n');
    if list.is_empty() {
        out.push_str(placeholder);
        out.push('\n');
    }
    for customer in list {
        out.push_str(&format!("[{}] {}\n", customer.user_id, customer.name));
    }
}

pub fn render_text(buckets: &ResultBucketSet) -> String {
    let mut out = String::new();
    text_section(
        &mut out,
        "Invite Summary:",
        buckets.invited(),
        "No customer selected",
    );
    if let Some(excluded) = buckets.excluded() {
        text_section(
            &mut out,
            "Exclusion Summary:",
            excluded,
            "No customer excluded",
        );
    }
    out
}

pub fn encode_report(buckets: &ResultBucketSet, format: Format) -> Result<Vec<u8>, EncodingError> {
    match format {
        Format::Json => Ok(serde_json::to_vec(buckets)?),
        Format::Yaml => Ok(serde_yaml::to_string(buckets)?.into_bytes()),
        Format::Xml => encode_xml(buckets),
        Format::Text => Ok(render_text(buckets).into_bytes()),
    }
}
