//! Thrift compact protocol.
//!
//! Integers are zigzag varints, field ids are delta-encoded against the
//! previous field of the same struct, and boolean fields carry their value
//! in the field header.

use crate::error::ProtocolError;
use crate::protocol::{Input, ProtocolReader, ProtocolWriter};
use crate::wire::{FieldHeader, MessageHeader, MessageType, TType};
use bytes::{BufMut, Bytes, BytesMut};

/// First byte of every compact message.
pub const PROTOCOL_ID: u8 = 0x82;

/// Compact protocol version.
pub const VERSION: u8 = 1;

const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;

const BOOLEAN_TRUE: u8 = 0x01;
const BOOLEAN_FALSE: u8 = 0x02;

fn compact_type(ttype: TType) -> u8 {
    match ttype {
        TType::Stop => 0x00,
        TType::Bool => BOOLEAN_TRUE,
        TType::I8 => 0x03,
        TType::I16 => 0x04,
        TType::I32 => 0x05,
        TType::I64 => 0x06,
        TType::Double => 0x07,
        TType::Binary => 0x08,
        TType::List => 0x09,
        TType::Set => 0x0a,
        TType::Map => 0x0b,
        TType::Struct => 0x0c,
    }
}

fn from_compact_type(v: u8) -> Result<TType, ProtocolError> {
    Ok(match v {
        0x00 => TType::Stop,
        BOOLEAN_TRUE | BOOLEAN_FALSE => TType::Bool,
        0x03 => TType::I8,
        0x04 => TType::I16,
        0x05 => TType::I32,
        0x06 => TType::I64,
        0x07 => TType::Double,
        0x08 => TType::Binary,
        0x09 => TType::List,
        0x0a => TType::Set,
        0x0b => TType::Map,
        0x0c => TType::Struct,
        other => return Err(ProtocolError::InvalidFieldType(other)),
    })
}

pub fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

pub fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

pub fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

fn put_varint(buf: &mut BytesMut, mut n: u64) {
    while n >= 0x80 {
        buf.put_u8((n as u8 & 0x7f) | 0x80);
        n >>= 7;
    }
    buf.put_u8(n as u8);
}

fn check_len(size: usize) -> Result<u32, ProtocolError> {
    if size > i32::MAX as usize {
        return Err(ProtocolError::SizeLimit {
            size,
            max: i32::MAX as usize,
        });
    }
    Ok(size as u32)
}

/// Compact protocol writer.
pub struct CompactWriter {
    buf: BytesMut,
    last_field_id: i16,
    field_stack: Vec<i16>,
    pending_bool_field: Option<i16>,
}

impl CompactWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            last_field_id: 0,
            field_stack: Vec::new(),
            pending_bool_field: None,
        }
    }

    fn write_field_header(&mut self, ctype: u8, id: i16) {
        let delta = id as i32 - self.last_field_id as i32;
        if id > self.last_field_id && delta <= 15 {
            self.buf.put_u8(((delta as u8) << 4) | ctype);
        } else {
            self.buf.put_u8(ctype);
            put_varint(&mut self.buf, zigzag32(id as i32) as u64);
        }
        self.last_field_id = id;
    }
}

impl Default for CompactWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWriter for CompactWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError> {
        self.buf.put_u8(PROTOCOL_ID);
        self.buf
            .put_u8((VERSION & VERSION_MASK) | (header.message_type.as_u8() << TYPE_SHIFT));
        put_varint(&mut self.buf, header.seqid as u32 as u64);
        self.write_string(&header.name)
    }

    fn write_struct_begin(&mut self) -> Result<(), ProtocolError> {
        self.field_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        self.last_field_id = self.field_stack.pop().unwrap_or(0);
        Ok(())
    }

    fn write_field_begin(&mut self, field_type: TType, id: i16) -> Result<(), ProtocolError> {
        if field_type == TType::Bool {
            self.pending_bool_field = Some(id);
        } else {
            self.write_field_header(compact_type(field_type), id);
        }
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        self.buf.put_u8(0);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<(), ProtocolError> {
        let ctype = if v { BOOLEAN_TRUE } else { BOOLEAN_FALSE };
        match self.pending_bool_field.take() {
            Some(id) => self.write_field_header(ctype, id),
            None => self.buf.put_u8(ctype),
        }
        Ok(())
    }

    fn write_i8(&mut self, v: i8) -> Result<(), ProtocolError> {
        self.buf.put_i8(v);
        Ok(())
    }

    fn write_i16(&mut self, v: i16) -> Result<(), ProtocolError> {
        put_varint(&mut self.buf, zigzag32(v as i32) as u64);
        Ok(())
    }

    fn write_i32(&mut self, v: i32) -> Result<(), ProtocolError> {
        put_varint(&mut self.buf, zigzag32(v) as u64);
        Ok(())
    }

    fn write_i64(&mut self, v: i64) -> Result<(), ProtocolError> {
        put_varint(&mut self.buf, zigzag64(v));
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<(), ProtocolError> {
        self.buf.put_f64_le(v);
        Ok(())
    }

    fn write_binary(&mut self, v: &[u8]) -> Result<(), ProtocolError> {
        put_varint(&mut self.buf, check_len(v.len())? as u64);
        self.buf.put_slice(v);
        Ok(())
    }

    fn write_list_begin(&mut self, elem_type: TType, size: usize) -> Result<(), ProtocolError> {
        let size = check_len(size)?;
        if size < 15 {
            self.buf.put_u8(((size as u8) << 4) | compact_type(elem_type));
        } else {
            self.buf.put_u8(0xf0 | compact_type(elem_type));
            put_varint(&mut self.buf, size as u64);
        }
        Ok(())
    }

    fn write_map_begin(
        &mut self,
        key_type: TType,
        value_type: TType,
        size: usize,
    ) -> Result<(), ProtocolError> {
        let size = check_len(size)?;
        if size == 0 {
            self.buf.put_u8(0);
        } else {
            put_varint(&mut self.buf, size as u64);
            self.buf
                .put_u8((compact_type(key_type) << 4) | compact_type(value_type));
        }
        Ok(())
    }

    fn into_bytes(self: Box<Self>) -> BytesMut {
        self.buf
    }
}

/// Compact protocol reader.
pub struct CompactReader {
    input: Input,
    last_field_id: i16,
    field_stack: Vec<i16>,
    pending_bool: Option<bool>,
}

impl CompactReader {
    pub fn new(data: Bytes, max_size: usize) -> Self {
        Self {
            input: Input::new(data, max_size),
            last_field_id: 0,
            field_stack: Vec::new(),
            pending_bool: None,
        }
    }

    fn read_varint(&mut self, max_bytes: usize) -> Result<u64, ProtocolError> {
        let mut result: u64 = 0;
        for i in 0..max_bytes {
            let byte = self.input.get_u8()?;
            result |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(ProtocolError::VarintOverflow)
    }

    fn read_varint32(&mut self) -> Result<u32, ProtocolError> {
        Ok(self.read_varint(5)? as u32)
    }
}

impl ProtocolReader for CompactReader {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        let protocol_id = self.input.get_u8()?;
        if protocol_id != PROTOCOL_ID {
            return Err(ProtocolError::InvalidProtocolId(protocol_id));
        }
        let version_and_type = self.input.get_u8()?;
        let version = version_and_type & VERSION_MASK;
        if version != VERSION {
            return Err(ProtocolError::BadVersion(version as u32));
        }
        let message_type = MessageType::from_u8((version_and_type >> TYPE_SHIFT) & 0x07)?;
        let seqid = self.read_varint32()? as i32;
        let name = self.read_string()?;
        Ok(MessageHeader::new(name, message_type, seqid))
    }

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError> {
        self.field_stack.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        self.last_field_id = self.field_stack.pop().unwrap_or(0);
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError> {
        let byte = self.input.get_u8()?;
        let ctype = byte & 0x0f;
        if ctype == 0 {
            return Ok(FieldHeader::stop());
        }
        let delta = (byte >> 4) as i16;
        let id = if delta != 0 {
            self.last_field_id.wrapping_add(delta)
        } else {
            unzigzag32(self.read_varint32()?) as i16
        };
        let field_type = from_compact_type(ctype)?;
        if field_type == TType::Bool {
            self.pending_bool = Some(ctype == BOOLEAN_TRUE);
        }
        self.last_field_id = id;
        Ok(FieldHeader { field_type, id })
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.pending_bool.take() {
            Some(v) => Ok(v),
            None => Ok(self.input.get_u8()? == BOOLEAN_TRUE),
        }
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.input.get_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(unzigzag32(self.read_varint32()?) as i16)
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(unzigzag32(self.read_varint32()?))
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(unzigzag64(self.read_varint(10)?))
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        self.input.get_f64_le()
    }

    fn read_binary(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.read_varint32()?;
        let len = self.input.check_size(len as i64)?;
        self.input.split(len)
    }

    fn read_list_begin(&mut self) -> Result<(TType, usize), ProtocolError> {
        let byte = self.input.get_u8()?;
        let elem_type = from_compact_type(byte & 0x0f)?;
        let short_size = (byte >> 4) as u32;
        let size = if short_size == 15 {
            self.read_varint32()?
        } else {
            short_size
        };
        Ok((elem_type, self.input.check_size(size as i64)?))
    }

    fn read_map_begin(&mut self) -> Result<(TType, TType, usize), ProtocolError> {
        let size = self.read_varint32()?;
        let size = self.input.check_size(size as i64)?;
        if size == 0 {
            return Ok((TType::Stop, TType::Stop, 0));
        }
        let types = self.input.get_u8()?;
        let key_type = from_compact_type(types >> 4)?;
        let value_type = from_compact_type(types & 0x0f)?;
        Ok((key_type, value_type, size))
    }

    fn position(&self) -> usize {
        self.input.position()
    }
}
