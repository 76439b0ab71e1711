//! Thrift type tags and message/field headers shared by every protocol.

use crate::error::ProtocolError;

/// Thrift value types, numbered as in the binary protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TType {
    Stop,
    Bool,
    I8,
    Double,
    I16,
    I32,
    I64,
    Binary,
    Struct,
    Map,
    Set,
    List,
}

impl TType {
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        Ok(match v {
            0 => TType::Stop,
            2 => TType::Bool,
            3 => TType::I8,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::Binary,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            other => return Err(ProtocolError::InvalidFieldType(other)),
        })
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            TType::Stop => 0,
            TType::Bool => 2,
            TType::I8 => 3,
            TType::Double => 4,
            TType::I16 => 6,
            TType::I32 => 8,
            TType::I64 => 10,
            TType::Binary => 11,
            TType::Struct => 12,
            TType::Map => 13,
            TType::Set => 14,
            TType::List => 15,
        }
    }
}

/// Thrift message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::Oneway => 4,
        }
    }
}

/// Header that opens every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Service method name.
    pub name: String,
    /// Message type.
    pub message_type: MessageType,
    /// Sequence id correlating a reply with its call.
    pub seqid: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, message_type: MessageType, seqid: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            seqid,
        }
    }
}

/// Header of one struct field. A `Stop` field type ends the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    pub field_type: TType,
    pub id: i16,
}

impl FieldHeader {
    pub fn stop() -> Self {
        Self {
            field_type: TType::Stop,
            id: 0,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.field_type == TType::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttype_ids() {
        for ttype in [
            TType::Stop,
            TType::Bool,
            TType::I8,
            TType::Double,
            TType::I16,
            TType::I32,
            TType::I64,
            TType::Binary,
            TType::Struct,
            TType::Map,
            TType::Set,
            TType::List,
        ] {
            assert_eq!(TType::from_u8(ttype.as_u8()).unwrap(), ttype);
        }
        assert!(matches!(
            TType::from_u8(5),
            Err(ProtocolError::InvalidFieldType(5))
        ));
    }

    #[test]
    fn test_message_type_ids() {
        assert_eq!(MessageType::from_u8(2).unwrap(), MessageType::Reply);
        assert_eq!(MessageType::Exception.as_u8(), 3);
        assert!(matches!(
            MessageType::from_u8(0),
            Err(ProtocolError::InvalidMessageType(0))
        ));
    }
}
