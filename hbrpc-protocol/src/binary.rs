//! Thrift binary protocol.
//!
//! Big-endian fixed-width integers, length-prefixed strings, and a strict
//! message header:
//!
//! ```text
//! +----------------------+-------------+--------------+---------+
//! | 0x8001 | 0x00 | type | name length | name         | seqid   |
//! | 4 bytes              | 4 bytes     | length bytes | 4 bytes |
//! +----------------------+-------------+--------------+---------+
//! ```
//!
//! Readers also accept the legacy header that starts directly with the
//! name length.

use crate::error::ProtocolError;
use crate::protocol::{Input, ProtocolReader, ProtocolWriter};
use crate::wire::{FieldHeader, MessageHeader, MessageType, TType};
use bytes::{BufMut, Bytes, BytesMut};

/// Version marker of strict binary message headers.
pub const VERSION_1: u32 = 0x8001_0000;

const VERSION_MASK: u32 = 0xffff_0000;

fn check_len(size: usize) -> Result<i32, ProtocolError> {
    i32::try_from(size).map_err(|_| ProtocolError::SizeLimit {
        size,
        max: i32::MAX as usize,
    })
}

/// Binary protocol writer.
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWriter for BinaryWriter {
    fn write_message_begin(&mut self, header: &MessageHeader) -> Result<(), ProtocolError> {
        self.buf
            .put_u32(VERSION_1 | header.message_type.as_u8() as u32);
        self.write_string(&header.name)?;
        self.buf.put_i32(header.seqid);
        Ok(())
    }

    fn write_struct_begin(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_begin(&mut self, field_type: TType, id: i16) -> Result<(), ProtocolError> {
        self.buf.put_u8(field_type.as_u8());
        self.buf.put_i16(id);
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        self.buf.put_u8(TType::Stop.as_u8());
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<(), ProtocolError> {
        self.buf.put_u8(v as u8);
        Ok(())
    }

    fn write_i8(&mut self, v: i8) -> Result<(), ProtocolError> {
        self.buf.put_i8(v);
        Ok(())
    }

    fn write_i16(&mut self, v: i16) -> Result<(), ProtocolError> {
        self.buf.put_i16(v);
        Ok(())
    }

    fn write_i32(&mut self, v: i32) -> Result<(), ProtocolError> {
        self.buf.put_i32(v);
        Ok(())
    }

    fn write_i64(&mut self, v: i64) -> Result<(), ProtocolError> {
        self.buf.put_i64(v);
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<(), ProtocolError> {
        self.buf.put_f64(v);
        Ok(())
    }

    fn write_binary(&mut self, v: &[u8]) -> Result<(), ProtocolError> {
        self.buf.put_i32(check_len(v.len())?);
        self.buf.put_slice(v);
        Ok(())
    }

    fn write_list_begin(&mut self, elem_type: TType, size: usize) -> Result<(), ProtocolError> {
        self.buf.put_u8(elem_type.as_u8());
        self.buf.put_i32(check_len(size)?);
        Ok(())
    }

    fn write_map_begin(
        &mut self,
        key_type: TType,
        value_type: TType,
        size: usize,
    ) -> Result<(), ProtocolError> {
        self.buf.put_u8(key_type.as_u8());
        self.buf.put_u8(value_type.as_u8());
        self.buf.put_i32(check_len(size)?);
        Ok(())
    }

    fn into_bytes(self: Box<Self>) -> BytesMut {
        self.buf
    }
}

/// Binary protocol reader.
pub struct BinaryReader {
    input: Input,
}

impl BinaryReader {
    pub fn new(data: Bytes, max_size: usize) -> Self {
        Self {
            input: Input::new(data, max_size),
        }
    }
}

impl ProtocolReader for BinaryReader {
    fn read_message_begin(&mut self) -> Result<MessageHeader, ProtocolError> {
        let first = self.input.get_i32()?;
        if first < 0 {
            let version = first as u32 & VERSION_MASK;
            if version != VERSION_1 {
                return Err(ProtocolError::BadVersion(first as u32));
            }
            let message_type = MessageType::from_u8((first & 0xff) as u8)?;
            let name = self.read_string()?;
            let seqid = self.input.get_i32()?;
            Ok(MessageHeader::new(name, message_type, seqid))
        } else {
            // Legacy header: the first word is the name length.
            let len = self.input.check_size(first as i64)?;
            let raw = self.input.split(len)?;
            let name = String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
            let message_type = MessageType::from_u8(self.input.get_u8()?)?;
            let seqid = self.input.get_i32()?;
            Ok(MessageHeader::new(name, message_type, seqid))
        }
    }

    fn read_struct_begin(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<FieldHeader, ProtocolError> {
        let field_type = TType::from_u8(self.input.get_u8()?)?;
        if field_type == TType::Stop {
            return Ok(FieldHeader::stop());
        }
        let id = self.input.get_i16()?;
        Ok(FieldHeader { field_type, id })
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.input.get_u8()? != 0)
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.input.get_u8()? as i8)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.input.get_i16()
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.input.get_i32()
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.input.get_i64()
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        self.input.get_f64()
    }

    fn read_binary(&mut self) -> Result<Bytes, ProtocolError> {
        let len = self.input.get_i32()?;
        let len = self.input.check_size(len as i64)?;
        self.input.split(len)
    }

    fn read_list_begin(&mut self) -> Result<(TType, usize), ProtocolError> {
        let elem_type = TType::from_u8(self.input.get_u8()?)?;
        let size = self.input.get_i32()?;
        Ok((elem_type, self.input.check_size(size as i64)?))
    }

    fn read_map_begin(&mut self) -> Result<(TType, TType, usize), ProtocolError> {
        let key_type = TType::from_u8(self.input.get_u8()?)?;
        let value_type = TType::from_u8(self.input.get_u8()?)?;
        let size = self.input.get_i32()?;
        Ok((key_type, value_type, self.input.check_size(size as i64)?))
    }

    fn position(&self) -> usize {
        self.input.position()
    }
}
