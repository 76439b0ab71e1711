//! Call arguments and reply envelopes.
//!
//! A call carries an argument struct whose field ids are fixed per method.
//! A reply carries a result struct: field 0 holds the return value and
//! fields 1.. hold the declared exceptions. The HBase gateway declares at
//! most three: `IOError` (1), `IllegalArgument` (2) and `AlreadyExists` (3).

use crate::error::ProtocolError;
use crate::protocol::{skip, ProtocolReader, ProtocolWriter};
use crate::types::{AlreadyExists, ApplicationException, IllegalArgument, IoError};
use crate::value::{read_field, write_field, write_list, write_map, ReadValue, WriteValue};
use crate::wire::{MessageType, TType};
use std::collections::HashMap;

/// Writes the fields of an argument or result struct.
///
/// Struct begin, stop and end markers are written by the encoder.
pub struct ArgWriter<'a> {
    w: &'a mut dyn ProtocolWriter,
}

impl<'a> ArgWriter<'a> {
    pub fn new(w: &'a mut dyn ProtocolWriter) -> Self {
        Self { w }
    }

    pub fn field<T: WriteValue + ?Sized>(
        &mut self,
        id: i16,
        value: &T,
    ) -> Result<&mut Self, ProtocolError> {
        write_field(self.w, id, value)?;
        Ok(self)
    }

    pub fn list<T: WriteValue>(&mut self, id: i16, items: &[T]) -> Result<&mut Self, ProtocolError> {
        self.w.write_field_begin(TType::List, id)?;
        write_list(self.w, items)?;
        Ok(self)
    }

    pub fn map<K: WriteValue, V: WriteValue>(
        &mut self,
        id: i16,
        map: &HashMap<K, V>,
    ) -> Result<&mut Self, ProtocolError> {
        self.w.write_field_begin(TType::Map, id)?;
        write_map(self.w, map)?;
        Ok(self)
    }

    /// Writes a map field only when present.
    pub fn opt_map<K: WriteValue, V: WriteValue>(
        &mut self,
        id: i16,
        map: Option<&HashMap<K, V>>,
    ) -> Result<&mut Self, ProtocolError> {
        match map {
            Some(map) => self.map(id, map),
            None => Ok(self),
        }
    }

    /// Raw access for hand-built values.
    pub fn writer(&mut self) -> &mut dyn ProtocolWriter {
        &mut *self.w
    }
}

/// Decoded result struct of a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub success: Option<T>,
    pub io: Option<IoError>,
    pub illegal_argument: Option<IllegalArgument>,
    pub already_exists: Option<AlreadyExists>,
}

impl<T> Default for Reply<T> {
    fn default() -> Self {
        Self {
            success: None,
            io: None,
            illegal_argument: None,
            already_exists: None,
        }
    }
}

impl<T: ReadValue> Reply<T> {
    /// Reads a result struct. Unknown fields are skipped.
    pub fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut reply = Reply::default();
        r.read_struct_begin()?;
        loop {
            let field = r.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            match field.id {
                0 => reply.success = read_field(r, field)?,
                1 => reply.io = read_field(r, field)?,
                2 => reply.illegal_argument = read_field(r, field)?,
                3 => reply.already_exists = read_field(r, field)?,
                _ => skip(r, field.field_type)?,
            }
        }
        r.read_struct_end()?;
        Ok(reply)
    }

    /// Returns true if any declared exception was set.
    pub fn has_exception(&self) -> bool {
        self.io.is_some() || self.illegal_argument.is_some() || self.already_exists.is_some()
    }
}

/// Body of a reply message.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody<T> {
    /// A REPLY message with its result struct.
    Result(Reply<T>),
    /// An EXCEPTION message raised by the Thrift layer.
    Exception(ApplicationException),
}

impl<T: ReadValue> ReplyBody<T> {
    /// Reads the body that follows a message header of `message_type`.
    pub fn read(
        message_type: MessageType,
        r: &mut dyn ProtocolReader,
    ) -> Result<Self, ProtocolError> {
        match message_type {
            MessageType::Reply => Ok(ReplyBody::Result(Reply::read(r)?)),
            MessageType::Exception => Ok(ReplyBody::Exception(ApplicationException::read(r)?)),
            other => Err(ProtocolError::InvalidMessageType(other.as_u8())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplicationErrorKind;
    use crate::protocol::ProtocolKind;
    use crate::types::Cell;
    use bytes::Bytes;

    fn result_struct<F>(kind: ProtocolKind, fields: F) -> Bytes
    where
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        let mut w = kind.writer();
        w.write_struct_begin().unwrap();
        fields(&mut ArgWriter::new(w.as_mut())).unwrap();
        w.write_field_stop().unwrap();
        w.write_struct_end().unwrap();
        w.into_bytes().freeze()
    }

    #[test]
    fn test_reply_success() {
        for kind in [ProtocolKind::Binary, ProtocolKind::Compact] {
            let data = result_struct(kind, |a| {
                a.list(0, &[Cell::new(&b"v"[..], 3)])?;
                Ok(())
            });
            let mut r = kind.reader(data, 1024);
            let reply = Reply::<Vec<Cell>>::read(r.as_mut()).unwrap();
            assert_eq!(reply.success, Some(vec![Cell::new(&b"v"[..], 3)]));
            assert!(!reply.has_exception());
        }
    }

    #[test]
    fn test_reply_exceptions() {
        let data = result_struct(ProtocolKind::Binary, |a| {
            a.field(1, &IoError::new("disk"))?
                .field(2, &IllegalArgument::new("bad row"))?;
            Ok(())
        });
        let mut r = ProtocolKind::Binary.reader(data, 1024);
        let reply = Reply::<i64>::read(r.as_mut()).unwrap();
        assert_eq!(reply.success, None);
        assert_eq!(reply.io, Some(IoError::new("disk")));
        assert_eq!(reply.illegal_argument, Some(IllegalArgument::new("bad row")));
        assert!(reply.already_exists.is_none());
        assert!(reply.has_exception());
    }

    #[test]
    fn test_void_reply_ignores_stray_success() {
        let data = result_struct(ProtocolKind::Compact, |a| {
            a.field(0, &7i32)?.field(3, &AlreadyExists::new("t1"))?;
            Ok(())
        });
        let mut r = ProtocolKind::Compact.reader(data, 1024);
        let reply = Reply::<()>::read(r.as_mut()).unwrap();
        assert!(reply.success.is_none());
        assert_eq!(reply.already_exists, Some(AlreadyExists::new("t1")));
    }

    #[test]
    fn test_reply_body_exception() {
        let mut w = ProtocolKind::Binary.writer();
        ApplicationException::new(ApplicationErrorKind::InternalError, "boom")
            .write(w.as_mut())
            .unwrap();
        let mut r = ProtocolKind::Binary.reader(w.into_bytes().freeze(), 1024);
        let body = ReplyBody::<()>::read(MessageType::Exception, r.as_mut()).unwrap();
        match body {
            ReplyBody::Exception(e) => {
                assert_eq!(e.kind, ApplicationErrorKind::InternalError);
                assert_eq!(e.message, "boom");
            }
            other => panic!("expected exception, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_body_rejects_call() {
        let mut r = ProtocolKind::Binary.reader(Bytes::from_static(b"\x00"), 1024);
        let result = ReplyBody::<()>::read(MessageType::Call, r.as_mut());
        assert!(matches!(result, Err(ProtocolError::InvalidMessageType(1))));
    }

    #[test]
    fn test_opt_map_skips_absent() {
        let absent = result_struct(ProtocolKind::Binary, |a| {
            a.opt_map::<String, String>(4, None)?;
            Ok(())
        });
        assert_eq!(&absent[..], b"\x00");

        let mut attrs = HashMap::new();
        attrs.insert("k".to_string(), "v".to_string());
        let present = result_struct(ProtocolKind::Binary, |a| {
            a.opt_map(4, Some(&attrs))?;
            Ok(())
        });
        assert_eq!(
            &present[..],
            b"\x0d\x00\x04\x0b\x0b\x00\x00\x00\x01\x00\x00\x00\x01k\x00\x00\x00\x01v\x00"
        );
    }
}
