//! Connection management.

use crate::error::ClientError;
use crate::transport::{Endpoint, Transport, TransportConfig, TransportFactory, TransportShape};
use hbrpc_protocol::codec::decode_message;
use hbrpc_protocol::{ArgWriter, Encoder, ProtocolError, ProtocolKind, ReadValue, Reply, ReplyBody};
use std::time::Duration;

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Gateway address.
    pub endpoint: Endpoint,
    /// Wire protocol.
    pub protocol: ProtocolKind,
    /// Transport shape and deadlines.
    pub transport: TransportConfig,
}

impl ConnectionConfig {
    /// Binary protocol over a buffered socket.
    pub fn socket(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: Endpoint::socket(host, port),
            protocol: ProtocolKind::Binary,
            transport: TransportConfig::default(),
        }
    }

    /// Binary protocol over HTTP.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::url(url),
            protocol: ProtocolKind::Binary,
            transport: TransportConfig::new(TransportShape::Http),
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    /// Selects the protocol by its numeric identifier.
    pub fn with_protocol_id(mut self, id: i32) -> Result<Self, ClientError> {
        self.protocol = ProtocolKind::from_id(id)?;
        Ok(self)
    }

    pub fn with_framed(mut self) -> Self {
        self.transport.shape = TransportShape::Framed;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.transport.shape = TransportShape::buffered(size);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.request_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.transport.max_message_size = size;
        self
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
}

/// Lifecycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Open,
    Close,
}

impl ConnectionState {
    /// State after `event` succeeds. Repeating the current state is a no-op.
    pub fn transition(self, event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Open => ConnectionState::Open,
            LifecycleEvent::Close => ConnectionState::Closed,
        }
    }

    /// Whether `event` requires touching the transport.
    pub fn needs_transport(self, event: LifecycleEvent) -> bool {
        self.transition(event) != self
    }
}

/// A connection to the gateway.
///
/// Calls take `&mut self`: one call is in flight at a time. Use one
/// connection per concurrent caller.
pub struct Connection {
    config: ConnectionConfig,
    transport: Transport,
    state: ConnectionState,
    seqid: i32,
}

impl Connection {
    /// Builds a closed connection. Fails on a malformed endpoint.
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        let transport = TransportFactory::build(&config.endpoint, &config.transport)?;
        Ok(Self {
            config,
            transport,
            state: ConnectionState::Closed,
            seqid: 0,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn protocol(&self) -> ProtocolKind {
        self.config.protocol
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Opens the transport. A no-op when already open; on failure the
    /// connection stays closed.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        self.apply(LifecycleEvent::Open).await
    }

    /// Closes the transport. A no-op when already closed; on failure the
    /// connection stays open so the close can be retried.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.apply(LifecycleEvent::Close).await
    }

    async fn apply(&mut self, event: LifecycleEvent) -> Result<(), ClientError> {
        if !self.state.needs_transport(event) {
            return Ok(());
        }
        match event {
            LifecycleEvent::Open => self.transport.open().await?,
            LifecycleEvent::Close => self.transport.close().await?,
        }
        self.state = self.state.transition(event);
        tracing::debug!("Connection to {} is {:?}", self.config.endpoint, self.state);
        Ok(())
    }

    fn next_seqid(&mut self) -> i32 {
        self.seqid = self.seqid.wrapping_add(1);
        self.seqid
    }

    /// Calls `method` with the arguments written by `args` and decodes the
    /// result struct.
    ///
    /// Declared exceptions are returned inside the [`Reply`]; an
    /// `EXCEPTION` message becomes [`ClientError::Application`].
    pub async fn call<T, F>(&mut self, method: &str, args: F) -> Result<Reply<T>, ClientError>
    where
        T: ReadValue,
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        if !self.is_open() {
            tracing::debug!("{} called but connection not open", method);
            return Err(ClientError::NotOpen);
        }

        let protocol = self.config.protocol;
        let seqid = self.next_seqid();
        let request = Encoder::encode_call(protocol, method, seqid, args)?.freeze();
        tracing::debug!(
            "Sending {} seqid={} ({} bytes)",
            method,
            seqid,
            request.len()
        );

        let deadline = self.config.transport.request_timeout;
        let max_size = self.config.transport.max_message_size;
        let transport = &mut self.transport;
        let exchange = async {
            let mut reply = transport.round_trip(protocol, request).await?;
            loop {
                tracing::debug!("{} seqid={} got {} bytes", method, seqid, reply.len());
                let (header, reader) = decode_message(protocol, reply, max_size)?;
                // Replies to calls that timed out earlier may still be queued.
                if seqid.wrapping_sub(header.seqid) > 0 {
                    tracing::warn!(
                        "Stale reply {} seqid={} while waiting for {} seqid={}",
                        header.name,
                        header.seqid,
                        method,
                        seqid
                    );
                    if let Some(next) = transport.recv(protocol).await? {
                        reply = next;
                        continue;
                    }
                }
                return Ok::<_, ClientError>((header, reader));
            }
        };

        let (header, mut reader) = match tokio::time::timeout(deadline, exchange).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                if !self.transport.is_open() {
                    tracing::debug!(
                        "Connection to {} lost during {}",
                        self.config.endpoint,
                        method
                    );
                    self.state = ConnectionState::Closed;
                }
                return Err(e);
            }
            Err(_) => {
                tracing::debug!("{} seqid={} timed out", method, seqid);
                return Err(ClientError::Timeout);
            }
        };

        if header.seqid != seqid {
            return Err(ClientError::SequenceMismatch {
                expected: seqid,
                actual: header.seqid,
            });
        }
        if header.name != method {
            tracing::warn!("Reply for {} arrived for call {}", header.name, method);
            return Err(ClientError::MethodMismatch {
                expected: method.to_string(),
                actual: header.name,
            });
        }

        match ReplyBody::read(header.message_type, reader.as_mut())? {
            ReplyBody::Result(reply) => Ok(reply),
            ReplyBody::Exception(e) => {
                tracing::debug!("{} raised {}", method, e);
                Err(ClientError::Application(e))
            }
        }
    }
}
