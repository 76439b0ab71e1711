//! Protocol error types and application exception kinds.

use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur while encoding or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("incomplete message: need {needed} more bytes")]
    Incomplete { needed: usize },

    #[error("bad protocol version: {0:#x}")]
    BadVersion(u32),

    #[error("invalid compact protocol id: {0:#x}")]
    InvalidProtocolId(u8),

    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("invalid field type: {0}")]
    InvalidFieldType(u8),

    #[error("negative size: {0}")]
    NegativeSize(i64),

    #[error("size too large: {size} bytes (max {max})")]
    SizeLimit { size: usize, max: usize },

    #[error("nesting depth limit exceeded ({0})")]
    DepthLimit(usize),

    #[error("varint too long")]
    VarintOverflow,

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("unexpected {found:?} where {expected:?} was declared")]
    TypeMismatch {
        expected: crate::wire::TType,
        found: crate::wire::TType,
    },

    #[error("unknown protocol identifier: {0}")]
    UnknownProtocol(i32),

    #[error("unknown protocol name: {0}")]
    UnknownProtocolName(String),

    #[error("protocol not supported: {0}")]
    UnsupportedProtocol(&'static str),
}

impl ProtocolError {
    /// Returns whether more input could make the failing decode succeed.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::Incomplete { .. })
    }
}

/// Kinds carried by a Thrift application exception.
///
/// The numeric values are part of the Thrift wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationErrorKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
    InvalidTransform,
    InvalidProtocol,
    UnsupportedClientType,
}

impl ApplicationErrorKind {
    /// Maps a wire value; unrecognized values collapse to `Unknown`.
    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            8 => Self::InvalidTransform,
            9 => Self::InvalidProtocol,
            10 => Self::UnsupportedClientType,
            _ => Self::Unknown,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::UnknownMethod => 1,
            Self::InvalidMessageType => 2,
            Self::WrongMethodName => 3,
            Self::BadSequenceId => 4,
            Self::MissingResult => 5,
            Self::InternalError => 6,
            Self::ProtocolError => 7,
            Self::InvalidTransform => 8,
            Self::InvalidProtocol => 9,
            Self::UnsupportedClientType => 10,
        }
    }
}

impl fmt::Display for ApplicationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::UnknownMethod => write!(f, "UNKNOWN_METHOD"),
            Self::InvalidMessageType => write!(f, "INVALID_MESSAGE_TYPE"),
            Self::WrongMethodName => write!(f, "WRONG_METHOD_NAME"),
            Self::BadSequenceId => write!(f, "BAD_SEQUENCE_ID"),
            Self::MissingResult => write!(f, "MISSING_RESULT"),
            Self::InternalError => write!(f, "INTERNAL_ERROR"),
            Self::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            Self::InvalidTransform => write!(f, "INVALID_TRANSFORM"),
            Self::InvalidProtocol => write!(f, "INVALID_PROTOCOL"),
            Self::UnsupportedClientType => write!(f, "UNSUPPORTED_CLIENT_TYPE"),
        }
    }
}
