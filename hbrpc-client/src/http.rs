//! HTTP transport: each call is one POST of the encoded message.

use crate::error::ClientError;
use crate::transport::TransportConfig;
use bytes::{Bytes, BytesMut};
use hbrpc_protocol::ProtocolError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;

/// Media type of Thrift payloads over HTTP.
pub const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

/// HTTP transport to a gateway URL.
///
/// Opening builds the client only; the TCP connection is made by the
/// first call.
pub struct HttpTransport {
    url: Url,
    connect_timeout: Duration,
    max_message_size: usize,
    client: Option<reqwest::Client>,
}

impl HttpTransport {
    pub fn new(url: Url, config: &TransportConfig) -> Self {
        Self {
            url,
            connect_timeout: config.connect_timeout,
            max_message_size: config.max_message_size,
            client: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    pub fn open(&mut self) -> Result<(), ClientError> {
        if self.client.is_some() {
            return Ok(());
        }
        tracing::debug!("Preparing HTTP transport to {}", self.url);
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()?;
        self.client = Some(client);
        Ok(())
    }

    pub fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("Closed HTTP transport to {}", self.url);
        }
    }

    /// Posts one message and returns the response body.
    pub async fn round_trip(&mut self, message: Bytes) -> Result<Bytes, ClientError> {
        let client = self.client.as_ref().ok_or(ClientError::NotOpen)?;

        let mut response = client
            .post(self.url.clone())
            .header(CONTENT_TYPE, THRIFT_CONTENT_TYPE)
            .header(ACCEPT, THRIFT_CONTENT_TYPE)
            .body(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("HTTP call to {} failed with {}", self.url, status);
            return Err(ClientError::HttpStatus(status.as_u16()));
        }

        let max_size = self.max_message_size;
        if let Some(len) = response.content_length() {
            if len > max_size as u64 {
                return Err(too_large(len as usize, max_size));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > max_size {
                tracing::debug!("HTTP reply from {} exceeds {} bytes", self.url, max_size);
                return Err(too_large(body.len() + chunk.len(), max_size));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

fn too_large(size: usize, max: usize) -> ClientError {
    ProtocolError::SizeLimit { size, max }.into()
}
