//! Encoder and decoder for Thrift messages.

use crate::error::ProtocolError;
use crate::message::ArgWriter;
use crate::protocol::{Boundary, MessageScanner, ProtocolKind, ProtocolReader};
use crate::types::ApplicationException;
use crate::value::WriteValue;
use crate::wire::{MessageHeader, MessageType};
use bytes::{Bytes, BytesMut};

/// Encodes call, reply and exception messages.
pub struct Encoder;

impl Encoder {
    /// Encodes a CALL message whose argument struct is written by `args`.
    pub fn encode_call<F>(
        protocol: ProtocolKind,
        method: &str,
        seqid: i32,
        args: F,
    ) -> Result<BytesMut, ProtocolError>
    where
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        let header = MessageHeader::new(method, MessageType::Call, seqid);
        Self::encode_struct_message(protocol, &header, args)
    }

    /// Encodes a REPLY message whose result struct is written by `result`.
    pub fn encode_reply<F>(
        protocol: ProtocolKind,
        method: &str,
        seqid: i32,
        result: F,
    ) -> Result<BytesMut, ProtocolError>
    where
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        let header = MessageHeader::new(method, MessageType::Reply, seqid);
        Self::encode_struct_message(protocol, &header, result)
    }

    /// Encodes an EXCEPTION message.
    pub fn encode_exception(
        protocol: ProtocolKind,
        method: &str,
        seqid: i32,
        exception: &ApplicationException,
    ) -> Result<BytesMut, ProtocolError> {
        let mut w = protocol.writer();
        w.write_message_begin(&MessageHeader::new(method, MessageType::Exception, seqid))?;
        exception.write(w.as_mut())?;
        Ok(w.into_bytes())
    }

    fn encode_struct_message<F>(
        protocol: ProtocolKind,
        header: &MessageHeader,
        fields: F,
    ) -> Result<BytesMut, ProtocolError>
    where
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        let mut w = protocol.writer();
        w.write_message_begin(header)?;
        w.write_struct_begin()?;
        fields(&mut ArgWriter::new(w.as_mut()))?;
        w.write_field_stop()?;
        w.write_struct_end()?;
        Ok(w.into_bytes())
    }
}

/// Reads the header of one complete message, returning the reader
/// positioned at the message body.
pub fn decode_message(
    protocol: ProtocolKind,
    data: Bytes,
    max_size: usize,
) -> Result<(MessageHeader, Box<dyn ProtocolReader>), ProtocolError> {
    if data.len() > max_size {
        return Err(ProtocolError::SizeLimit {
            size: data.len(),
            max: max_size,
        });
    }
    let mut reader = protocol.reader(data, max_size);
    let header = reader.read_message_begin()?;
    Ok((header, reader))
}

/// Splits a byte stream into whole messages.
///
/// Unframed transports carry no length prefix, so boundaries are found by
/// walking the message structure. The walk resumes where the previous
/// chunk left off.
pub struct MessageDecoder {
    protocol: ProtocolKind,
    buffer: BytesMut,
    max_size: usize,
    scanner: MessageScanner,
    resume_at: usize,
}

impl MessageDecoder {
    pub fn new(protocol: ProtocolKind, max_size: usize) -> Self {
        Self {
            protocol,
            buffer: BytesMut::with_capacity(8192),
            max_size,
            scanner: MessageScanner::new(),
            resume_at: 0,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Removes and returns the next complete message, if buffered.
    pub fn next_message(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.buffer.is_empty() || self.buffer.len() < self.resume_at {
            return Ok(None);
        }
        match self
            .scanner
            .advance(self.protocol, &self.buffer, self.max_size)?
        {
            Boundary::Complete(len) => {
                self.scanner.reset();
                self.resume_at = 0;
                Ok(Some(self.buffer.split_to(len).freeze()))
            }
            Boundary::Partial { needed } => {
                self.resume_at = self.buffer.len() + needed;
                Ok(None)
            }
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanner.reset();
        self.resume_at = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplicationErrorKind;
    use crate::message::ReplyBody;
    use crate::types::{IoError, RowResult};
    use crate::MAX_MESSAGE_SIZE;

    fn sample_call(protocol: ProtocolKind, seqid: i32) -> BytesMut {
        Encoder::encode_call(protocol, "getRow", seqid, |args| {
            args.field(1, "t1")?.field(2, &b"row-1"[..])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_call_header_and_args() {
        for protocol in [ProtocolKind::Binary, ProtocolKind::Compact] {
            let encoded = sample_call(protocol, 7);
            let (header, mut r) =
                decode_message(protocol, encoded.freeze(), MAX_MESSAGE_SIZE).unwrap();
            assert_eq!(header, MessageHeader::new("getRow", MessageType::Call, 7));

            r.read_struct_begin().unwrap();
            let field = r.read_field_begin().unwrap();
            assert_eq!(field.id, 1);
            assert_eq!(r.read_string().unwrap(), "t1");
            let field = r.read_field_begin().unwrap();
            assert_eq!(field.id, 2);
            assert_eq!(r.read_binary().unwrap().as_ref(), b"row-1");
            assert!(r.read_field_begin().unwrap().is_stop());
        }
    }

    #[test]
    fn test_reply_roundtrip() {
        let encoded = Encoder::encode_reply(ProtocolKind::Compact, "getRow", 3, |result| {
            result.list(0, &[RowResult::default()])?;
            Ok(())
        })
        .unwrap();

        let (header, mut r) =
            decode_message(ProtocolKind::Compact, encoded.freeze(), MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(header.message_type, MessageType::Reply);
        assert_eq!(header.seqid, 3);
        match ReplyBody::<Vec<RowResult>>::read(header.message_type, r.as_mut()).unwrap() {
            ReplyBody::Result(reply) => {
                assert_eq!(reply.success, Some(vec![RowResult::default()]));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_exception_roundtrip() {
        let exception = ApplicationException::new(ApplicationErrorKind::UnknownMethod, "getFoo");
        let encoded =
            Encoder::encode_exception(ProtocolKind::Binary, "getFoo", 1, &exception).unwrap();

        let (header, mut r) =
            decode_message(ProtocolKind::Binary, encoded.freeze(), MAX_MESSAGE_SIZE).unwrap();
        assert_eq!(header.message_type, MessageType::Exception);
        let body = ReplyBody::<()>::read(header.message_type, r.as_mut()).unwrap();
        assert_eq!(body, ReplyBody::Exception(exception));
    }

    #[test]
    fn test_decode_message_size_limit() {
        let encoded = sample_call(ProtocolKind::Binary, 1);
        let result = decode_message(ProtocolKind::Binary, encoded.freeze(), 8);
        assert!(matches!(result, Err(ProtocolError::SizeLimit { max: 8, .. })));
    }

    #[test]
    fn test_partial_message_decoding() {
        for protocol in [ProtocolKind::Binary, ProtocolKind::Compact] {
            let encoded = Encoder::encode_reply(protocol, "get", 1, |result| {
                result.field(1, &IoError::new("region moved"))?;
                Ok(())
            })
            .unwrap();

            let mut decoder = MessageDecoder::new(protocol, MAX_MESSAGE_SIZE);
            decoder.extend(&encoded[..5]);
            assert!(decoder.next_message().unwrap().is_none());

            decoder.extend(&encoded[5..]);
            let message = decoder.next_message().unwrap().unwrap();
            assert_eq!(message.as_ref(), &encoded[..]);
            assert_eq!(decoder.buffered(), 0);
        }
    }

    #[test]
    fn test_multiple_messages_in_buffer() {
        let first = sample_call(ProtocolKind::Binary, 1);
        let second = sample_call(ProtocolKind::Binary, 2);

        let mut decoder = MessageDecoder::new(ProtocolKind::Binary, MAX_MESSAGE_SIZE);
        decoder.extend(&first);
        decoder.extend(&second);

        assert_eq!(decoder.next_message().unwrap().unwrap().as_ref(), &first[..]);
        assert_eq!(decoder.next_message().unwrap().unwrap().as_ref(), &second[..]);
        assert!(decoder.next_message().unwrap().is_none());
    }

    #[test]
    fn test_large_reply_in_small_chunks() {
        let rows: Vec<RowResult> = (0..500)
            .map(|i| RowResult {
                row: format!("row-{:04}", i).into(),
                ..Default::default()
            })
            .collect();
        let first = Encoder::encode_reply(ProtocolKind::Compact, "getRows", 1, |result| {
            result.list(0, &rows)?;
            Ok(())
        })
        .unwrap();
        let second = sample_call(ProtocolKind::Compact, 2);
        let mut stream = first.to_vec();
        stream.extend_from_slice(&second);

        let mut decoder = MessageDecoder::new(ProtocolKind::Compact, MAX_MESSAGE_SIZE);
        let mut messages = Vec::new();
        for chunk in stream.chunks(7) {
            decoder.extend(chunk);
            while let Some(message) = decoder.next_message().unwrap() {
                messages.push(message);
            }
        }
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].as_ref(), &first[..]);
        assert_eq!(messages[1].as_ref(), &second[..]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_buffered_and_clear() {
        let mut decoder = MessageDecoder::new(ProtocolKind::Compact, 1024);
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(b"\x82\x41");
        assert_eq!(decoder.buffered(), 2);

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }
}
