use crate::utils::error::SourceOpenError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::io::AsyncRead;
use url::Url;

pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Where records come from, resolved from the user's descriptor string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    File(PathBuf),
    Tcp(String),
    Udp(String),
    Http(Url),
    Ftp(Url),
}

impl SourceDescriptor {
    pub fn parse(raw: &str) -> Result<Self, SourceOpenError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SourceOpenError::EmptyDescriptor);
        }
        if !raw.contains("://") {
            return Ok(SourceDescriptor::File(PathBuf::from(raw)));
        }

        let url = Url::parse(raw).map_err(|e| SourceOpenError::InvalidDescriptor {
            descriptor: raw.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "tcp" => Ok(SourceDescriptor::Tcp(socket_address(raw, &url)?)),
            "udp" => Ok(SourceDescriptor::Udp(socket_address(raw, &url)?)),
            "http" | "https" => Ok(SourceDescriptor::Http(url)),
            "ftp" | "sftp" => Ok(SourceDescriptor::Ftp(url)),
            "file" => url
                .to_file_path()
                .map(SourceDescriptor::File)
                .map_err(|_| SourceOpenError::InvalidDescriptor {
                    descriptor: raw.to_string(),
                    reason: "file URL does not name a local path".to_string(),
                }),
            other => Err(SourceOpenError::InvalidDescriptor {
                descriptor: raw.to_string(),
                reason: format!("unknown scheme '{}'", other),
            }),
        }
    }

    pub fn transport_name(&self) -> &'static str {
        match self {
            SourceDescriptor::File(_) => "file",
            SourceDescriptor::Tcp(_) => "tcp",
            SourceDescriptor::Udp(_) => "udp",
            SourceDescriptor::Http(_) => "http",
            SourceDescriptor::Ftp(_) => "ftp",
        }
    }
    /// Datagram sources never signal end of stream; they finish by going quiet.
    pub fn is_datagram(&self) -> bool {
        matches!(self, SourceDescriptor::Udp(_))
    }
}

fn socket_address(raw: &str, url: &Url) -> Result<String, SourceOpenError> {
    let invalid = |reason: &str| SourceOpenError::InvalidDescriptor {
        descriptor: raw.to_string(),
        reason: reason.to_string(),
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    let port = url.port().ok_or_else(|| invalid("missing port"))?;
    Ok(format!("{}:{}", host, port))
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::File(path) => write!(f, "{}", path.display()),
            SourceDescriptor::Tcp(addr) => write!(f, "tcp://{}", addr),
            SourceDescriptor::Udp(addr) => write!(f, "udp://{}", addr),
            SourceDescriptor::Http(url) | SourceDescriptor::Ftp(url) => write!(f, "{}", url),
        }
    }
}

/// An opened source. Dropping it, or calling [`SourceHandle::release`] any
/// number of times, closes the underlying transport exactly once.
pub struct SourceHandle {
    label: String,
    reader: Option<ByteStream>,
}

impl SourceHandle {
    pub fn new(label: impl Into<String>, reader: ByteStream) -> Self {
        Self {
            label: label.into(),
            reader: Some(reader),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn reader_mut(&mut self) -> Option<&mut ByteStream> {
        self.reader.as_mut()
    }

    /// Returns `true` only on the call that actually closed the stream.
    pub fn release(&mut self) -> bool {
        match self.reader.take() {
            Some(reader) => {
                drop(reader);
                tracing::debug!(source = %self.label, "source released");
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("label", &self.label)
            .field("released", &self.is_released())
            .finish()
    }
}

/// One implementation per transport family.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    async fn open(&self, source: &SourceDescriptor) -> Result<SourceHandle, SourceOpenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path_as_file() {
        let parsed = SourceDescriptor::parse(" ./customers.txt ").unwrap();
        assert_eq!(parsed, SourceDescriptor::File(PathBuf::from("./customers.txt")));
    }

    #[test]
    fn test_parse_network_schemes() {
        assert_eq!(
            SourceDescriptor::parse("tcp://127.0.0.1:19099").unwrap(),
            SourceDescriptor::Tcp("127.0.0.1:19099".to_string())
        );
        assert_eq!(
            SourceDescriptor::parse("udp://feeds.local:5000").unwrap(),
            SourceDescriptor::Udp("feeds.local:5000".to_string())
        );
        assert_eq!(
            SourceDescriptor::parse("https://example.com/customers.txt")
                .unwrap()
                .transport_name(),
            "http"
        );
        assert_eq!(
            SourceDescriptor::parse("sftp://example.com/customers.txt")
                .unwrap()
                .transport_name(),
            "ftp"
        );
    }

    #[test]
    fn test_only_udp_is_datagram() {
        assert!(SourceDescriptor::parse("udp://127.0.0.1:5000").unwrap().is_datagram());
        assert!(!SourceDescriptor::parse("tcp://127.0.0.1:5000").unwrap().is_datagram());
        assert!(!SourceDescriptor::parse("customers.txt").unwrap().is_datagram());
    }

    #[test]
    fn test_parse_rejects_bad_descriptors() {
        assert!(matches!(
            SourceDescriptor::parse("   "),
            Err(SourceOpenError::EmptyDescriptor)
        ));
        assert!(matches!(
            SourceDescriptor::parse("tcp://127.0.0.1"),
            Err(SourceOpenError::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            SourceDescriptor::parse("gopher://example.com:70"),
            Err(SourceOpenError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_release_is_idempotent() {
        let reader: ByteStream = Box::new(tokio::io::empty());
        let mut handle = SourceHandle::new("test", reader);
        assert!(!handle.is_released());
        assert!(handle.release());
        assert!(!handle.release());
        assert!(handle.is_released());
        assert!(handle.reader_mut().is_none());
    }
}
