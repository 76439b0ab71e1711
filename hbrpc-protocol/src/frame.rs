//! Length-prefixed frames for the framed socket transport.
//!
//! ```text
//! +-------------+-------------------------------+
//! | payload_len | payload (one Thrift message)  |
//! | 4 bytes BE  | payload_len bytes             |
//! +-------------+-------------------------------+
//! ```

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// One frame carrying a single encoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encodes the frame, rejecting payloads above `max_size`.
    pub fn encode(&self, max_size: usize) -> Result<BytesMut, ProtocolError> {
        let size = self.payload.len();
        if size > max_size || size > i32::MAX as usize {
            return Err(ProtocolError::SizeLimit {
                size,
                max: max_size,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + size);
        buf.put_i32(size as i32);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Parses the declared payload length from a frame header.
    pub fn payload_len(header: [u8; FRAME_HEADER_SIZE], max_size: usize) -> Result<usize, ProtocolError> {
        let len = i32::from_be_bytes(header);
        if len < 0 {
            return Err(ProtocolError::NegativeSize(len as i64));
        }
        let len = len as usize;
        if len > max_size {
            return Err(ProtocolError::SizeLimit {
                size: len,
                max: max_size,
            });
        }
        Ok(len)
    }

    /// Decodes a frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` if more data is needed; nothing is consumed then.
    pub fn decode(buf: &mut BytesMut, max_size: usize) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = [buf[0], buf[1], buf[2], buf[3]];
        let payload_len = Self::payload_len(header, max_size)?;
        if buf.len() < FRAME_HEADER_SIZE + payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(payload_len).freeze();
        Ok(Some(Self { payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(&b"\x80\x01\x00\x02payload"[..]);
        let mut buf = frame.encode(1024).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 11]);

        let decoded = Frame::decode(&mut buf, 1024).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&b"\x00\x00"[..]);
        assert!(Frame::decode(&mut buf, 1024).unwrap().is_none());

        let mut buf = BytesMut::from(&b"\x00\x00\x00\x05abc"[..]);
        assert!(Frame::decode(&mut buf, 1024).unwrap().is_none());
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn test_frame_too_large() {
        let frame = Frame::new(vec![0u8; 65]);
        let result = frame.encode(64);
        assert!(matches!(result, Err(ProtocolError::SizeLimit { size: 65, max: 64 })));

        let mut buf = BytesMut::from(&b"\x00\x01\x00\x00"[..]);
        let result = Frame::decode(&mut buf, 1024);
        assert!(matches!(result, Err(ProtocolError::SizeLimit { size: 65536, .. })));
    }

    #[test]
    fn test_negative_length() {
        let mut buf = BytesMut::from(&b"\xff\xff\xff\xff"[..]);
        let result = Frame::decode(&mut buf, 1024);
        assert!(matches!(result, Err(ProtocolError::NegativeSize(-1))));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = Frame::new(Bytes::new()).encode(1024).unwrap();
        let decoded = Frame::decode(&mut buf, 1024).unwrap().unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(&b"one"[..]).encode(1024).unwrap());
        buf.extend_from_slice(&Frame::new(&b"two"[..]).encode(1024).unwrap());

        let first = Frame::decode(&mut buf, 1024).unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"one");
        let second = Frame::decode(&mut buf, 1024).unwrap().unwrap();
        assert_eq!(second.payload.as_ref(), b"two");
        assert!(Frame::decode(&mut buf, 1024).unwrap().is_none());
    }
}
