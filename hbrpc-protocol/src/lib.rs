//! # hbrpc-protocol
//!
//! Wire layer for hbrpc, a client for the HBase Thrift gateway.
//!
//! This crate provides:
//! - Thrift binary and compact protocol codecs behind one reader/writer pair of traits
//! - Protocol selection by numeric identifier or name
//! - Message boundary detection for unframed streams and a length-prefixed frame codec
//! - Call/reply envelopes and the HBase wire structs

pub mod binary;
pub mod codec;
pub mod compact;
pub mod error;
pub mod frame;
pub mod message;
pub mod protocol;
pub mod types;
pub mod value;
pub mod wire;

pub use codec::{Encoder, MessageDecoder};
pub use error::{ApplicationErrorKind, ProtocolError};
pub use frame::{Frame, FRAME_HEADER_SIZE};
pub use message::{ArgWriter, Reply, ReplyBody};
pub use protocol::{Boundary, MessageScanner, ProtocolKind, ProtocolReader, ProtocolWriter};
pub use types::{
    AlreadyExists, ApplicationException, BatchMutation, Cell, ColumnDescriptor, IllegalArgument,
    Increment, IoError, Mutation, RegionInfo, RowResult, Scan,
};
pub use value::{ReadValue, WriteValue};
pub use wire::{FieldHeader, MessageHeader, MessageType, TType};

/// Default port of the HBase Thrift gateway.
pub const DEFAULT_PORT: u16 = 9090;

/// Maximum message size accepted by default (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Maximum struct/container nesting followed when skipping unknown fields.
pub const MAX_SKIP_DEPTH: usize = 64;
