//! Client error types.

use crate::decode::DecodeError;
use hbrpc_protocol::{AlreadyExists, ApplicationException};
use thiserror::Error;

/// Client faults: everything that is not a server-declared `IOError` or
/// `IllegalArgument`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] hbrpc_protocol::ProtocolError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("connection not open")]
    NotOpen,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("table already exists: {}", .0.message)]
    AlreadyExists(AlreadyExists),

    #[error("{0}: reply carried no result")]
    MissingResult(String),

    #[error("application exception: {0}")]
    Application(ApplicationException),

    #[error("sequence id mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: i32, actual: i32 },

    #[error("method mismatch: expected {expected}, got {actual}")]
    MethodMismatch { expected: String, actual: String },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl ClientError {
    /// Returns whether the fault came from the byte channel.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. }
                | ClientError::Io(_)
                | ClientError::Http(_)
                | ClientError::HttpStatus(_)
                | ClientError::ConnectionClosed
                | ClientError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbrpc_protocol::ApplicationErrorKind;

    #[test]
    fn test_display() {
        assert_eq!(ClientError::NotOpen.to_string(), "connection not open");
        assert_eq!(
            ClientError::AlreadyExists(AlreadyExists::new("t1")).to_string(),
            "table already exists: t1"
        );
        assert_eq!(
            ClientError::Application(ApplicationException::new(
                ApplicationErrorKind::UnknownMethod,
                "getFoo"
            ))
            .to_string(),
            "application exception: UNKNOWN_METHOD: getFoo"
        );
        assert_eq!(
            ClientError::SequenceMismatch {
                expected: 2,
                actual: 1
            }
            .to_string(),
            "sequence id mismatch: expected 2, got 1"
        );
    }

    #[test]
    fn test_is_transport() {
        assert!(ClientError::Timeout.is_transport());
        assert!(ClientError::HttpStatus(503).is_transport());
        assert!(!ClientError::NotOpen.is_transport());
        assert!(!ClientError::MissingResult("get".into()).is_transport());
    }
}
