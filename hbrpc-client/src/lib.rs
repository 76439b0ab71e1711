//! # hbrpc-client
//!
//! Client library for the HBase Thrift gateway.
//!
//! This crate provides:
//! - Buffered, framed and HTTP transports behind one factory
//! - Connection lifecycle with idempotent open/close
//! - High-level API for every gateway call
//! - A unified error carrying IOError, IllegalArgument and client faults together
//! - Decoding of row results into typed destinations

pub mod client;
pub mod connection;
pub mod decode;
pub mod error;
pub mod http;
pub mod scan;
pub mod socket;
pub mod transport;
pub mod unified;

pub use client::{Attributes, Client, ScannerId};
pub use connection::{Connection, ConnectionConfig, ConnectionState, LifecycleEvent};
pub use decode::{decode_columns, DecodeError, DecodeRow, Destination, DestinationKind};
pub use error::ClientError;
pub use scan::ScanRequest;
pub use transport::{Endpoint, Transport, TransportConfig, TransportFactory, TransportShape};
pub use unified::{unify, Fault, HbaseError};

pub use hbrpc_protocol::{
    BatchMutation, Cell, ColumnDescriptor, Increment, IoError, IllegalArgument, Mutation,
    ProtocolKind, RegionInfo, RowResult, DEFAULT_PORT,
};
