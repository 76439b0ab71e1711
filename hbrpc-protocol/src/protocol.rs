//! Protocol selection and the reader/writer interface every codec implements.

use crate::binary::{BinaryReader, BinaryWriter};
use crate::compact::{CompactReader, CompactWriter};
use crate::error::ProtocolError;
use crate::wire::{FieldHeader, MessageHeader, TType};
use crate::MAX_SKIP_DEPTH;
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;

/// Serializes Thrift values into an owned buffer.
pub trait ProtocolWriter: Send {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError>;
    fn write_struct_begin(&mut self) -> Result<(), ProtocolError>;
    fn write_struct_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_begin(&mut self, field_type: TType, id: i16) -> Result<(), ProtocolError>;
    fn write_field_stop(&mut self) -> Result<(), ProtocolError>;
    fn write_bool(&mut self, v: bool) -> Result<(), ProtocolError>;
    fn write_i8(&mut self, v: i8) -> Result<(), ProtocolError>;
    fn write_i16(&mut self, v: i16) -> Result<(), ProtocolError>;
    fn write_i32(&mut self, v: i32) -> Result<(), ProtocolError>;
    fn write_i64(&mut self, v: i64) -> Result<(), ProtocolError>;
    fn write_double(&mut self, v: f64) -> Result<(), ProtocolError>;
    fn write_binary(&mut self, v: &[u8]) -> Result<(), ProtocolError>;
    fn write_list_begin(&mut self, elem_type: TType, size: usize) -> Result<(), ProtocolError>;
    fn write_map_begin(
        &mut self,
        key_type: TType,
        value_type: TType,
        size: usize,
    ) -> Result<(), ProtocolError>;

    fn write_string(&mut self, v: &str) -> Result<(), ProtocolError> {
        self.write_binary(v.as_bytes())
    }

    /// Consumes the writer and returns the encoded bytes.
    fn into_bytes(self: Box<Self>) -> BytesMut;
}

/// Deserializes Thrift values from an in-memory message.
///
/// Reads past the end of the input fail with [`ProtocolError::Incomplete`],
/// which callers reading from a stream treat as "need more bytes".
pub trait ProtocolReader: Send {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError>;
    fn read_struct_begin(&mut self) -> Result<(), ProtocolError>;
    fn read_struct_end(&mut self) -> Result<(), ProtocolError>;
    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError>;
    fn read_bool(&mut self) -> Result<bool, ProtocolError>;
    fn read_i8(&mut self) -> Result<i8, ProtocolError>;
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;
    fn read_i64(&mut self) -> Result<i64, ProtocolError>;
    fn read_double(&mut self) -> Result<f64, ProtocolError>;
    fn read_binary(&mut self) -> Result<Bytes, ProtocolError>;
    fn read_list_begin(&mut self) -> Result<(TType, usize), ProtocolError>;
    fn read_map_begin(&mut self) -> Result<(TType, TType, usize), ProtocolError>;

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let raw = self.read_binary()?;
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Number of bytes consumed so far.
    fn position(&self) -> usize;
}

/// Skips one value of the given type, descending into containers.
pub fn skip(r: &mut dyn ProtocolReader, ttype: TType) -> Result<(), ProtocolError> {
    skip_nested(r, ttype, MAX_SKIP_DEPTH)
}

fn skip_nested(
    r: &mut dyn ProtocolReader,
    ttype: TType,
    depth: usize,
) -> Result<(), ProtocolError> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit(MAX_SKIP_DEPTH));
    }
    match ttype {
        TType::Stop => return Err(ProtocolError::InvalidFieldType(0)),
        TType::Bool => {
            r.read_bool()?;
        }
        TType::I8 => {
            r.read_i8()?;
        }
        TType::I16 => {
            r.read_i16()?;
        }
        TType::I32 => {
            r.read_i32()?;
        }
        TType::I64 => {
            r.read_i64()?;
        }
        TType::Double => {
            r.read_double()?;
        }
        TType::Binary => {
            r.read_binary()?;
        }
        TType::Struct => {
            r.read_struct_begin()?;
            loop {
                let field = r.read_field_begin()?;
                if field.is_stop() {
                    break;
                }
                skip_nested(r, field.field_type, depth - 1)?;
            }
            r.read_struct_end()?;
        }
        TType::Map => {
            let (key_type, value_type, size) = r.read_map_begin()?;
            for _ in 0..size {
                skip_nested(r, key_type, depth - 1)?;
                skip_nested(r, value_type, depth - 1)?;
            }
        }
        TType::Set | TType::List => {
            let (elem_type, size) = r.read_list_begin()?;
            for _ in 0..size {
                skip_nested(r, elem_type, depth - 1)?;
            }
        }
    }
    Ok(())
}

/// The protocol codecs a connection can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolKind {
    #[default]
    Binary,
    Compact,
}

impl ProtocolKind {
    pub const BINARY_ID: i32 = 0;
    pub const COMPACT_ID: i32 = 1;
    pub const JSON_ID: i32 = 2;
    pub const SIMPLE_JSON_ID: i32 = 3;
    pub const DEBUG_ID: i32 = 4;

    /// Maps a numeric protocol identifier onto a codec.
    ///
    /// JSON, simple-JSON and debug identifiers are recognized but have no codec.
    pub fn from_id(id: i32) -> Result<Self, ProtocolError> {
        match id {
            Self::BINARY_ID => Ok(ProtocolKind::Binary),
            Self::COMPACT_ID => Ok(ProtocolKind::Compact),
            Self::JSON_ID => Err(ProtocolError::UnsupportedProtocol("json")),
            Self::SIMPLE_JSON_ID => Err(ProtocolError::UnsupportedProtocol("simple-json")),
            Self::DEBUG_ID => Err(ProtocolError::UnsupportedProtocol("debug")),
            other => Err(ProtocolError::UnknownProtocol(other)),
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            ProtocolKind::Binary => Self::BINARY_ID,
            ProtocolKind::Compact => Self::COMPACT_ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::Binary => "binary",
            ProtocolKind::Compact => "compact",
        }
    }

    /// Creates an empty writer for this protocol.
    pub fn writer(&self) -> Box<dyn ProtocolWriter> {
        match self {
            ProtocolKind::Binary => Box::new(BinaryWriter::new()),
            ProtocolKind::Compact => Box::new(CompactWriter::new()),
        }
    }

    /// Creates a reader over one message.
    pub fn reader(&self, data: Bytes, max_size: usize) -> Box<dyn ProtocolReader> {
        match self {
            ProtocolKind::Binary => Box::new(BinaryReader::new(data, max_size)),
            ProtocolKind::Compact => Box::new(CompactReader::new(data, max_size)),
        }
    }

    /// Returns the length of the first complete message in `buf`.
    ///
    /// Returns `Ok(None)` if more data is needed. Streams that grow a
    /// buffer chunk by chunk should keep a [`MessageScanner`] instead.
    pub fn message_len(&self, buf: &[u8], max_size: usize) -> Result<Option<usize>, ProtocolError> {
        match MessageScanner::new().advance(*self, buf, max_size)? {
            Boundary::Complete(len) => Ok(Some(len)),
            Boundary::Partial { .. } => Ok(None),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProtocolKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(ProtocolKind::Binary),
            "compact" => Ok(ProtocolKind::Compact),
            "json" => Err(ProtocolError::UnsupportedProtocol("json")),
            "simple-json" | "simplejson" => Err(ProtocolError::UnsupportedProtocol("simple-json")),
            "debug" => Err(ProtocolError::UnsupportedProtocol("debug")),
            _ => Err(ProtocolError::UnknownProtocolName(s.to_string())),
        }
    }
}

/// Outcome of scanning a buffer for a message boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The first message ends at this offset.
    Complete(usize),
    /// The buffer must grow by at least `needed` bytes before the scan can
    /// make progress.
    Partial { needed: usize },
}

#[derive(Debug, Clone, Copy)]
enum Expect {
    Fields,
    Values {
        types: [TType; 2],
        next: usize,
        remaining: usize,
    },
}

/// Walks one message token by token across calls, so a growing buffer is
/// scanned once rather than from the start on every chunk.
#[derive(Debug, Default)]
pub struct MessageScanner {
    started: bool,
    offset: usize,
    stack: Vec<Expect>,
}

impl MessageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the walk so the scanner can start on the next message.
    pub fn reset(&mut self) {
        self.started = false;
        self.offset = 0;
        self.stack.clear();
    }

    /// Continues the walk over `buf`.
    ///
    /// `buf` must begin with the bytes passed on earlier calls since the
    /// last reset. Only bytes past the last whole token are read again.
    pub fn advance(
        &mut self,
        protocol: ProtocolKind,
        buf: &[u8],
        max_size: usize,
    ) -> Result<Boundary, ProtocolError> {
        let base = self.offset;
        let tail = buf.get(base..).unwrap_or_default();
        let mut reader = protocol.reader(Bytes::copy_from_slice(tail), max_size);

        loop {
            match self.step(reader.as_mut()) {
                Ok(done) => {
                    self.offset = base + reader.position();
                    if done {
                        return Ok(Boundary::Complete(self.offset));
                    }
                }
                Err(ProtocolError::Incomplete { needed }) => {
                    if buf.len() > max_size {
                        return Err(ProtocolError::SizeLimit {
                            size: buf.len(),
                            max: max_size,
                        });
                    }
                    return Ok(Boundary::Partial { needed });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consumes one token. State only changes once its reads succeed.
    fn step(&mut self, r: &mut dyn ProtocolReader) -> Result<bool, ProtocolError> {
        if !self.started {
            r.read_message_begin()?;
            self.open(r, TType::Struct)?;
            self.started = true;
            return Ok(false);
        }

        let depth = self.stack.len();
        match self.stack.last().copied() {
            None => {}
            Some(Expect::Fields) => {
                let field = r.read_field_begin()?;
                if field.is_stop() {
                    r.read_struct_end()?;
                    self.stack.pop();
                } else {
                    self.open(r, field.field_type)?;
                }
            }
            Some(Expect::Values { remaining: 0, .. }) => {
                self.stack.pop();
            }
            Some(Expect::Values {
                types,
                next,
                remaining,
            }) => {
                self.open(r, types[next])?;
                if let Some(entry) = self.stack.get_mut(depth - 1) {
                    *entry = Expect::Values {
                        types,
                        next: next ^ 1,
                        remaining: remaining - 1,
                    };
                }
            }
        }
        Ok(self.stack.is_empty())
    }

    fn open(&mut self, r: &mut dyn ProtocolReader, ttype: TType) -> Result<(), ProtocolError> {
        let entry = match ttype {
            TType::Struct => {
                r.read_struct_begin()?;
                Expect::Fields
            }
            TType::Map => {
                let (key_type, value_type, size) = r.read_map_begin()?;
                Expect::Values {
                    types: [key_type, value_type],
                    next: 0,
                    remaining: size * 2,
                }
            }
            TType::Set | TType::List => {
                let (elem_type, size) = r.read_list_begin()?;
                Expect::Values {
                    types: [elem_type, elem_type],
                    next: 0,
                    remaining: size,
                }
            }
            scalar => return skip(r, scalar),
        };
        if self.stack.len() >= MAX_SKIP_DEPTH {
            return Err(ProtocolError::DepthLimit(MAX_SKIP_DEPTH));
        }
        self.stack.push(entry);
        Ok(())
    }
}

/// Bounds-checked cursor shared by the protocol readers.
pub(crate) struct Input {
    data: Bytes,
    total: usize,
    max_size: usize,
}

impl Input {
    pub(crate) fn new(data: Bytes, max_size: usize) -> Self {
        Self {
            total: data.len(),
            data,
            max_size,
        }
    }

    pub(crate) fn ensure(&self, n: usize) -> Result<(), ProtocolError> {
        let remaining = self.data.remaining();
        if remaining < n {
            return Err(ProtocolError::Incomplete {
                needed: n - remaining,
            });
        }
        Ok(())
    }

    pub(crate) fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.data.get_u8())
    }

    pub(crate) fn get_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.data.get_i16())
    }

    pub(crate) fn get_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.data.get_i32())
    }

    pub(crate) fn get_i64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.data.get_i64())
    }

    pub(crate) fn get_f64(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.data.get_f64())
    }

    pub(crate) fn get_f64_le(&mut self) -> Result<f64, ProtocolError> {
        self.ensure(8)?;
        Ok(self.data.get_f64_le())
    }

    /// Validates a declared string or container size.
    pub(crate) fn check_size(&self, size: i64) -> Result<usize, ProtocolError> {
        if size < 0 {
            return Err(ProtocolError::NegativeSize(size));
        }
        let size = size as usize;
        if size > self.max_size {
            return Err(ProtocolError::SizeLimit {
                size,
                max: self.max_size,
            });
        }
        Ok(size)
    }

    pub(crate) fn split(&mut self, n: usize) -> Result<Bytes, ProtocolError> {
        self.ensure(n)?;
        Ok(self.data.split_to(n))
    }

    pub(crate) fn position(&self) -> usize {
        self.total - self.data.remaining()
    }
}
