//! Transport selection.
//!
//! A transport moves whole encoded messages between client and gateway.
//! Three shapes exist: a buffered socket, a length-framed socket, and an
//! HTTP transport that posts one request per call.

use crate::error::ClientError;
use crate::http::HttpTransport;
use crate::socket::{SocketFraming, SocketTransport};
use bytes::Bytes;
use hbrpc_protocol::{ProtocolKind, MAX_MESSAGE_SIZE};
use std::fmt;
use std::time::Duration;

/// Default socket buffer size (8 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum socket buffer size (1 KiB).
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Maximum socket buffer size (1 MiB).
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Where the gateway is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Socket { host: String, port: u16 },
    Url(String),
}

impl Endpoint {
    pub fn socket(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Socket {
            host: host.into(),
            port,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Endpoint::Url(url.into())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Socket { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Endpoint::Socket { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Url(url) => f.write_str(url),
        }
    }
}

/// Byte-channel strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportShape {
    /// Raw socket behind a read/write buffer of `buffer_size` bytes.
    Buffered { buffer_size: usize },
    /// Raw socket, every message prefixed with its 4-byte length.
    Framed,
    /// One HTTP POST per call.
    Http,
}

impl TransportShape {
    /// Buffered shape with a buffer size clamped to the allowed range.
    pub fn buffered(buffer_size: usize) -> Self {
        TransportShape::Buffered {
            buffer_size: buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportShape::Buffered { .. } => "buffered",
            TransportShape::Framed => "framed",
            TransportShape::Http => "http",
        }
    }
}

impl Default for TransportShape {
    fn default() -> Self {
        TransportShape::Buffered {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub shape: TransportShape,
    /// Deadline for establishing the socket connection.
    pub connect_timeout: Duration,
    /// Deadline for one call, from send to complete reply.
    pub request_timeout: Duration,
    /// Largest message accepted in either direction.
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            shape: TransportShape::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn new(shape: TransportShape) -> Self {
        Self {
            shape,
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// Builds transports from an endpoint and a shape.
pub struct TransportFactory;

impl TransportFactory {
    /// Validates the endpoint against the shape and builds a closed transport.
    ///
    /// Nothing is connected here; [`Transport::open`] connects.
    pub fn build(endpoint: &Endpoint, config: &TransportConfig) -> Result<Transport, ClientError> {
        match (config.shape, endpoint) {
            (TransportShape::Http, Endpoint::Url(url)) => {
                let url = reqwest::Url::parse(url)
                    .map_err(|e| ClientError::Address(format!("{}: {}", url, e)))?;
                if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                    return Err(ClientError::Address(format!(
                        "{}: expected an http or https URL",
                        url
                    )));
                }
                Ok(Transport::Http(HttpTransport::new(url, config)))
            }
            (TransportShape::Http, Endpoint::Socket { .. }) => Err(ClientError::Address(
                format!("{}: http transport needs a URL", endpoint),
            )),
            (_, Endpoint::Url(url)) => Err(ClientError::Address(format!(
                "{}: socket transport needs host and port",
                url
            ))),
            (shape, Endpoint::Socket { host, port }) => {
                if host.trim().is_empty() {
                    return Err(ClientError::Address("empty host".to_string()));
                }
                if *port == 0 {
                    return Err(ClientError::Address(format!("{}: port must be non-zero", endpoint)));
                }
                let framing = match shape {
                    TransportShape::Buffered { buffer_size } => SocketFraming::Buffered {
                        buffer_size: buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
                    },
                    _ => SocketFraming::Framed,
                };
                Ok(Transport::Socket(SocketTransport::new(
                    host.clone(),
                    *port,
                    framing,
                    config,
                )))
            }
        }
    }
}

/// A transport of any shape.
pub enum Transport {
    Socket(SocketTransport),
    Http(HttpTransport),
    #[cfg(test)]
    Scripted(scripted::ScriptedTransport),
}

impl Transport {
    /// Connects (socket shapes) or prepares the HTTP client.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        match self {
            Transport::Socket(t) => t.open().await,
            Transport::Http(t) => t.open(),
            #[cfg(test)]
            Transport::Scripted(t) => t.open(),
        }
    }

    /// Tears down the channel.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        match self {
            Transport::Socket(t) => t.close().await,
            Transport::Http(t) => {
                t.close();
                Ok(())
            }
            #[cfg(test)]
            Transport::Scripted(t) => t.close(),
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Transport::Socket(t) => t.is_open(),
            Transport::Http(t) => t.is_open(),
            #[cfg(test)]
            Transport::Scripted(t) => t.is_open(),
        }
    }

    /// Sends one encoded message and returns the reply message.
    pub async fn round_trip(
        &mut self,
        protocol: ProtocolKind,
        message: Bytes,
    ) -> Result<Bytes, ClientError> {
        match self {
            Transport::Socket(t) => t.round_trip(protocol, message).await,
            Transport::Http(t) => t.round_trip(message).await,
            #[cfg(test)]
            Transport::Scripted(t) => t.round_trip(),
        }
    }

    /// Reads a further reply without sending anything.
    ///
    /// Only socket shapes can carry more than one reply per request; HTTP
    /// returns `None`.
    pub async fn recv(&mut self, protocol: ProtocolKind) -> Result<Option<Bytes>, ClientError> {
        match self {
            Transport::Socket(t) => t.recv(protocol).await.map(Some),
            Transport::Http(_) => Ok(None),
            #[cfg(test)]
            Transport::Scripted(_) => Ok(None),
        }
    }

    pub fn shape(&self) -> TransportShape {
        match self {
            Transport::Socket(t) => match t.framing() {
                SocketFraming::Buffered { buffer_size } => TransportShape::Buffered { buffer_size },
                SocketFraming::Framed => TransportShape::Framed,
            },
            Transport::Http(_) => TransportShape::Http,
            #[cfg(test)]
            Transport::Scripted(_) => TransportShape::Framed,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(
            config.shape,
            TransportShape::Buffered {
                buffer_size: DEFAULT_BUFFER_SIZE
            }
        );
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_message_size, MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_buffer_clamping() {
        assert_eq!(
            TransportShape::buffered(100),
            TransportShape::Buffered {
                buffer_size: MIN_BUFFER_SIZE
            }
        );
        assert_eq!(
            TransportShape::buffered(10 * 1024 * 1024),
            TransportShape::Buffered {
                buffer_size: MAX_BUFFER_SIZE
            }
        );
    }

    #[test]
    fn test_build_socket_shapes() {
        let endpoint = Endpoint::socket("localhost", 9090);
        let t = TransportFactory::build(&endpoint, &TransportConfig::default()).unwrap();
        assert_eq!(t.shape(), TransportShape::default());
        assert!(!t.is_open());

        let t = TransportFactory::build(&endpoint, &TransportConfig::new(TransportShape::Framed))
            .unwrap();
        assert_eq!(t.shape(), TransportShape::Framed);
    }

    #[test]
    fn test_build_http() {
        let config = TransportConfig::new(TransportShape::Http);
        let t = TransportFactory::build(&Endpoint::url("http://gateway:8080/"), &config).unwrap();
        assert_eq!(t.shape(), TransportShape::Http);
        assert!(!t.is_open());
    }

    #[test]
    fn test_malformed_endpoints() {
        let http = TransportConfig::new(TransportShape::Http);
        let socket = TransportConfig::default();

        for (endpoint, config) in [
            (Endpoint::url("not a url"), &http),
            (Endpoint::url("ftp://gateway/"), &http),
            (Endpoint::socket("gateway", 9090), &http),
            (Endpoint::url("http://gateway/"), &socket),
            (Endpoint::socket("", 9090), &socket),
            (Endpoint::socket("gateway", 0), &socket),
        ] {
            let result = TransportFactory::build(&endpoint, config);
            assert!(
                matches!(result, Err(ClientError::Address(_))),
                "{} should be rejected",
                endpoint
            );
        }
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::socket("h", 1).to_string(), "h:1");
        assert_eq!(Endpoint::socket("::1", 9090).to_string(), "[::1]:9090");
        assert_eq!(Endpoint::url("http://h/").to_string(), "http://h/");
    }
}
