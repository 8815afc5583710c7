use crate::domain::ports::{ByteStream, SourceDescriptor, SourceHandle, TransportOpener};
use crate::utils::error::SourceOpenError;
use async_trait::async_trait;
use reqwest::Client;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::net::{TcpStream, UdpSocket};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Local files and named pipes.
#[derive(Debug, Clone, Default)]
pub struct FileOpener;

impl FileOpener {
    pub async fn open_path(&self, path: &Path) -> Result<SourceHandle, SourceOpenError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| SourceOpenError::File {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!("Opened file source {}", path.display());
        Ok(SourceHandle::new(path.display().to_string(), Box::new(file)))
    }
}

#[derive(Debug, Clone)]
pub struct TcpOpener {
    connect_timeout: Duration,
}

impl TcpOpener {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub async fn open_address(&self, address: &str) -> Result<SourceHandle, SourceOpenError> {
        let connect = TcpStream::connect(address);
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(SourceOpenError::Unreachable {
                    endpoint: format!("tcp://{}", address),
                    source,
                })
            }
            Err(_) => {
                return Err(SourceOpenError::Unreachable {
                    endpoint: format!("tcp://{}", address),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };
        tracing::debug!("Connected to tcp://{}", address);
        Ok(SourceHandle::new(format!("tcp://{}", address), Box::new(stream)))
    }
}

impl Default for TcpOpener {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

/// Connected UDP socket read as a byte stream, one datagram per read.
///
/// A datagram larger than the caller's buffer is truncated by the OS.
struct DatagramStream {
    socket: UdpSocket,
}

impl AsyncRead for DatagramStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.socket.poll_recv(cx, buf)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UdpOpener;

impl UdpOpener {
    pub async fn open_address(&self, address: &str) -> Result<SourceHandle, SourceOpenError> {
        let endpoint = format!("udp://{}", address);
        let unreachable = |source: io::Error| SourceOpenError::Unreachable {
            endpoint: endpoint.clone(),
            source,
        };

        let remote: SocketAddr = tokio::net::lookup_host(address)
            .await
            .map_err(unreachable)?
            .next()
            .ok_or_else(|| {
                unreachable(io::Error::new(
                    io::ErrorKind::NotFound,
                    "address did not resolve",
                ))
            })?;

        let local: SocketAddr = if remote.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(unreachable)?;
        socket.connect(remote).await.map_err(unreachable)?;

        tracing::debug!("Connected datagram socket to {}", endpoint);
        Ok(SourceHandle::new(endpoint, Box::new(DatagramStream { socket })))
    }
}

/// Fetches an HTTP(S) document and serves its body.
#[derive(Debug, Clone)]
pub struct HttpOpener {
    client: Client,
}

impl HttpOpener {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn open_url(&self, url: &url::Url) -> Result<SourceHandle, SourceOpenError> {
        tracing::debug!("Making HTTP request to: {}", url);
        let response = self.client.get(url.clone()).send().await?;
        tracing::debug!("HTTP response status: {}", response.status());

        if !response.status().is_success() {
            return Err(SourceOpenError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let reader: ByteStream = Box::new(io::Cursor::new(body));
        Ok(SourceHandle::new(url.to_string(), reader))
    }
}

impl Default for HttpOpener {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

/// Picks the opener from the descriptor's already-parsed scheme.
#[derive(Debug, Clone, Default)]
pub struct SchemeOpener {
    file: FileOpener,
    tcp: TcpOpener,
    udp: UdpOpener,
    http: HttpOpener,
}

impl SchemeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.tcp = TcpOpener::new(timeout);
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = HttpOpener::new(client);
        self
    }
}

#[async_trait]
impl TransportOpener for SchemeOpener {
    async fn open(&self, source: &SourceDescriptor) -> Result<SourceHandle, SourceOpenError> {
        match source {
            SourceDescriptor::File(path) => self.file.open_path(path).await,
            SourceDescriptor::Tcp(address) => self.tcp.open_address(address).await,
            SourceDescriptor::Udp(address) => self.udp.open_address(address).await,
            SourceDescriptor::Http(url) => self.http.open_url(url).await,
            SourceDescriptor::Ftp(url) => {
                Err(SourceOpenError::UnsupportedScheme(url.scheme().to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let opener = SchemeOpener::new();
        let source = SourceDescriptor::parse("/definitely/not/here/customers.txt").unwrap();
        let err = opener.open(&source).await.unwrap_err();
        assert!(matches!(err, SourceOpenError::File { .. }));
    }

    #[tokio::test]
    async fn test_ftp_is_rejected() {
        let opener = SchemeOpener::new();
        let source = SourceDescriptor::parse("ftp://example.com/customers.txt").unwrap();
        let err = opener.open(&source).await.unwrap_err();
        assert!(matches!(err, SourceOpenError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[tokio::test]
    async fn test_tcp_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let opener = SchemeOpener::new().with_connect_timeout(Duration::from_secs(2));
        let source = SourceDescriptor::parse(&format!("tcp://{}", addr)).unwrap();
        let err = opener.open(&source).await.unwrap_err();
        assert!(matches!(err, SourceOpenError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_udp_open_and_release() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let source =
            SourceDescriptor::parse(&format!("udp://{}", server.local_addr().unwrap())).unwrap();

        let mut handle = SchemeOpener::new().open(&source).await.unwrap();
        assert!(handle.label().starts_with("udp://127.0.0.1:"));
        assert!(handle.release());
        assert!(!handle.release());
    }

    #[tokio::test]
    async fn test_datagram_stream_reads_each_datagram() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(server.local_addr().unwrap()).await.unwrap();
        let client_addr = client.local_addr().unwrap();

        server.send_to(b"{\"user_id\": 1}\n", client_addr).await.unwrap();
        server.send_to(b"{\"user_id\": 2}\n", client_addr).await.unwrap();

        let mut stream = DatagramStream { socket: client };
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"{\"user_id\": 1}\n");
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"{\"user_id\": 2}\n");
    }

    #[tokio::test]
    async fn test_tcp_reads_stream() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut socket, b"hello")
                .await
                .unwrap();
        });

        let source = SourceDescriptor::parse(&format!("tcp://{}", addr)).unwrap();
        let mut handle = SchemeOpener::new().open(&source).await.unwrap();
        let mut body = String::new();
        handle
            .reader_mut()
            .unwrap()
            .read_to_string(&mut body)
            .await
            .unwrap();
        assert_eq!(body, "hello");
    }
}
