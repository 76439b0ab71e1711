//! Socket transports: buffered and length-framed.

use crate::error::ClientError;
use crate::transport::TransportConfig;
use bytes::{Bytes, BytesMut};
use hbrpc_protocol::{Frame, MessageDecoder, ProtocolKind, FRAME_HEADER_SIZE};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

const READ_RESERVE: usize = 8 * 1024;

/// How messages are delimited on the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketFraming {
    /// Messages are self-delimiting; reads and writes go through a buffer.
    Buffered { buffer_size: usize },
    /// Each message carries a 4-byte big-endian length prefix.
    Framed,
}

enum SocketStream {
    Buffered {
        stream: BufStream<TcpStream>,
        chunk_size: usize,
        decoder: Option<MessageDecoder>,
    },
    Framed {
        stream: TcpStream,
        inbox: BytesMut,
    },
}

/// A TCP connection to the gateway.
///
/// Bytes read past the end of a reply stay buffered with the stream and
/// start the next reply. A request whose write was cut short leaves the
/// peer mid-message, so the stream is dropped before the next send.
pub struct SocketTransport {
    host: String,
    port: u16,
    framing: SocketFraming,
    connect_timeout: Duration,
    max_message_size: usize,
    stream: Option<SocketStream>,
    writing: bool,
}

impl SocketTransport {
    pub fn new(host: String, port: u16, framing: SocketFraming, config: &TransportConfig) -> Self {
        Self {
            host,
            port,
            framing,
            connect_timeout: config.connect_timeout,
            max_message_size: config.max_message_size,
            stream: None,
            writing: false,
        }
    }

    pub fn framing(&self) -> SocketFraming {
        self.framing
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Connects to the gateway. A no-op if already connected.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.addr();
        tracing::debug!("Connecting to {}...", addr);

        let tcp_stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Connect {
                addr: addr.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            }
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Connect {
                addr: addr.clone(),
                source: e,
            }
        })?;

        tcp_stream.set_nodelay(true).ok();

        self.writing = false;
        self.stream = Some(match self.framing {
            SocketFraming::Buffered { buffer_size } => SocketStream::Buffered {
                stream: BufStream::with_capacity(buffer_size, buffer_size, tcp_stream),
                chunk_size: buffer_size,
                decoder: None,
            },
            SocketFraming::Framed => SocketStream::Framed {
                stream: tcp_stream,
                inbox: BytesMut::with_capacity(FRAME_HEADER_SIZE),
            },
        });
        tracing::debug!("Connected to {}", addr);
        Ok(())
    }

    /// Shuts the socket down. On failure the socket is kept so the caller
    /// can retry.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        tracing::debug!("Shutting down connection to {}", self.addr());
        let result = match &mut stream {
            SocketStream::Buffered { stream, .. } => stream.shutdown().await,
            SocketStream::Framed { stream, .. } => stream.shutdown().await,
        };
        match result {
            Ok(()) => Ok(()),
            // The peer already went away; nothing is left to tear down.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => {
                tracing::debug!("Shutdown failed: {}", e);
                self.stream = Some(stream);
                Err(ClientError::Io(e))
            }
        }
    }

    /// Writes one message and reads back the next reply message.
    pub async fn round_trip(
        &mut self,
        protocol: ProtocolKind,
        message: Bytes,
    ) -> Result<Bytes, ClientError> {
        self.send(message).await?;
        self.recv(protocol).await
    }

    /// Writes one message.
    pub async fn send(&mut self, message: Bytes) -> Result<(), ClientError> {
        if self.writing {
            tracing::warn!(
                "Dropping connection to {}: previous request was only partly written",
                self.addr()
            );
            self.stream = None;
            self.writing = false;
            return Err(ClientError::ConnectionClosed);
        }

        let max_size = self.max_message_size;
        let stream = self.stream.as_mut().ok_or(ClientError::NotOpen)?;
        let out = match stream {
            SocketStream::Buffered { .. } => message,
            SocketStream::Framed { .. } => Frame::new(message).encode(max_size)?.freeze(),
        };

        self.writing = true;
        let result = match stream {
            SocketStream::Buffered { stream, .. } => write_all(stream, &out).await,
            SocketStream::Framed { stream, .. } => write_all(stream, &out).await,
        };
        self.writing = false;
        self.settle(result)
    }

    /// Reads the next reply message, starting with any bytes left over
    /// from the previous one.
    pub async fn recv(&mut self, protocol: ProtocolKind) -> Result<Bytes, ClientError> {
        let max_size = self.max_message_size;
        let stream = self.stream.as_mut().ok_or(ClientError::NotOpen)?;
        let result = match stream {
            SocketStream::Buffered {
                stream,
                chunk_size,
                decoder,
            } => {
                let decoder = decoder.get_or_insert_with(|| MessageDecoder::new(protocol, max_size));
                read_message(stream, decoder, *chunk_size).await
            }
            SocketStream::Framed { stream, inbox } => read_frame(stream, inbox, max_size).await,
        };
        self.settle(result)
    }

    /// Drops the stream after a fault; its read position can no longer be
    /// trusted.
    fn settle<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            tracing::debug!("Dropping connection to {}: {}", self.addr(), e);
            self.stream = None;
        }
        result
    }
}

async fn write_all<S>(stream: &mut S, data: &[u8]) -> Result<(), ClientError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads until one complete self-delimited message is buffered.
async fn read_message(
    stream: &mut BufStream<TcpStream>,
    decoder: &mut MessageDecoder,
    chunk_size: usize,
) -> Result<Bytes, ClientError> {
    let mut buf = vec![0u8; chunk_size];

    loop {
        if let Some(message) = decoder.next_message()? {
            return Ok(message);
        }

        let n = stream.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!(
                "Connection closed with {} bytes of partial reply",
                decoder.buffered()
            );
            return Err(ClientError::ConnectionClosed);
        }
        decoder.extend(&buf[..n]);
    }
}

/// Reads one length-prefixed frame.
async fn read_frame(
    stream: &mut TcpStream,
    inbox: &mut BytesMut,
    max_size: usize,
) -> Result<Bytes, ClientError> {
    loop {
        if let Some(frame) = Frame::decode(inbox, max_size)? {
            return Ok(frame.payload);
        }

        inbox.reserve(READ_RESERVE);
        if stream.read_buf(inbox).await? == 0 {
            tracing::debug!("Connection closed with {} bytes of partial frame", inbox.len());
            return Err(ClientError::ConnectionClosed);
        }
    }
}
