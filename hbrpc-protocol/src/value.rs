//! Typed reading and writing of Thrift values.

use crate::error::ProtocolError;
use crate::protocol::{skip, ProtocolReader, ProtocolWriter};
use crate::wire::{FieldHeader, TType};
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::Hash;

/// A value that can be decoded from a protocol reader.
pub trait ReadValue: Sized {
    /// Wire type this value is declared with.
    const TTYPE: TType;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError>;
}

/// A value that can be encoded with a protocol writer.
pub trait WriteValue {
    const TTYPE: TType;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError>;
}

/// Reads a field value if its declared type matches, otherwise skips it.
pub fn read_field<T: ReadValue>(
    r: &mut dyn ProtocolReader,
    field: FieldHeader,
) -> Result<Option<T>, ProtocolError> {
    if field.field_type == T::TTYPE {
        Ok(Some(T::read(r)?))
    } else {
        skip(r, field.field_type)?;
        Ok(None)
    }
}

/// Reads a binary value as text, replacing invalid UTF-8.
///
/// HBase declares names and row keys as `Text` (raw bytes); callers that
/// want strings should not fail on the odd non-UTF-8 qualifier.
pub fn read_text(r: &mut dyn ProtocolReader) -> Result<String, ProtocolError> {
    let raw = r.read_binary()?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Writes one field: header followed by value.
pub fn write_field<T: WriteValue + ?Sized>(
    w: &mut dyn ProtocolWriter,
    id: i16,
    value: &T,
) -> Result<(), ProtocolError> {
    w.write_field_begin(T::TTYPE, id)?;
    value.write(w)
}

/// Writes one list-typed field.
pub fn write_list_field<T: WriteValue>(
    w: &mut dyn ProtocolWriter,
    id: i16,
    items: &[T],
) -> Result<(), ProtocolError> {
    w.write_field_begin(TType::List, id)?;
    write_list(w, items)
}

pub fn write_list<T: WriteValue>(
    w: &mut dyn ProtocolWriter,
    items: &[T],
) -> Result<(), ProtocolError> {
    w.write_list_begin(T::TTYPE, items.len())?;
    for item in items {
        item.write(w)?;
    }
    Ok(())
}

pub fn write_map<K: WriteValue, V: WriteValue>(
    w: &mut dyn ProtocolWriter,
    map: &HashMap<K, V>,
) -> Result<(), ProtocolError> {
    w.write_map_begin(K::TTYPE, V::TTYPE, map.len())?;
    for (k, v) in map {
        k.write(w)?;
        v.write(w)?;
    }
    Ok(())
}

fn check_elem(expected: TType, found: TType, size: usize) -> Result<(), ProtocolError> {
    if size > 0 && found != expected {
        return Err(ProtocolError::TypeMismatch { expected, found });
    }
    Ok(())
}

/// Void results.
///
/// Never matches a declared field type, so a stray success field is skipped.
impl ReadValue for () {
    const TTYPE: TType = TType::Stop;

    fn read(_r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        Ok(())
    }
}

macro_rules! scalar_value {
    ($ty:ty, $ttype:expr, $read:ident, $write:ident) => {
        impl ReadValue for $ty {
            const TTYPE: TType = $ttype;

            fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
                r.$read()
            }
        }

        impl WriteValue for $ty {
            const TTYPE: TType = $ttype;

            fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
                w.$write(*self)
            }
        }
    };
}

scalar_value!(bool, TType::Bool, read_bool, write_bool);
scalar_value!(i8, TType::I8, read_i8, write_i8);
scalar_value!(i16, TType::I16, read_i16, write_i16);
scalar_value!(i32, TType::I32, read_i32, write_i32);
scalar_value!(i64, TType::I64, read_i64, write_i64);
scalar_value!(f64, TType::Double, read_double, write_double);

impl ReadValue for Bytes {
    const TTYPE: TType = TType::Binary;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        r.read_binary()
    }
}

impl WriteValue for Bytes {
    const TTYPE: TType = TType::Binary;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        w.write_binary(self)
    }
}

impl WriteValue for [u8] {
    const TTYPE: TType = TType::Binary;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        w.write_binary(self)
    }
}

impl WriteValue for Vec<u8> {
    const TTYPE: TType = TType::Binary;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        w.write_binary(self)
    }
}

impl ReadValue for String {
    const TTYPE: TType = TType::Binary;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        r.read_string()
    }
}

impl WriteValue for String {
    const TTYPE: TType = TType::Binary;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        w.write_string(self)
    }
}

impl WriteValue for str {
    const TTYPE: TType = TType::Binary;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        w.write_string(self)
    }
}

impl<T: WriteValue + ?Sized> WriteValue for &T {
    const TTYPE: TType = T::TTYPE;

    fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        (**self).write(w)
    }
}

impl<T: ReadValue> ReadValue for Vec<T> {
    const TTYPE: TType = TType::List;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let (elem_type, size) = r.read_list_begin()?;
        check_elem(T::TTYPE, elem_type, size)?;
        let mut items = Vec::with_capacity(size.min(1024));
        for _ in 0..size {
            items.push(T::read(r)?);
        }
        Ok(items)
    }
}

impl<K, V> ReadValue for HashMap<K, V>
where
    K: ReadValue + Eq + Hash,
    V: ReadValue,
{
    const TTYPE: TType = TType::Map;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let (key_type, value_type, size) = r.read_map_begin()?;
        check_elem(K::TTYPE, key_type, size)?;
        check_elem(V::TTYPE, value_type, size)?;
        let mut map = HashMap::with_capacity(size.min(1024));
        for _ in 0..size {
            let k = K::read(r)?;
            let v = V::read(r)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolKind;

    #[test]
    fn test_list_and_map_values() {
        for kind in [ProtocolKind::Binary, ProtocolKind::Compact] {
            let mut w = kind.writer();
            write_list(w.as_mut(), &[Bytes::from_static(b"a"), Bytes::from_static(b"bc")])
                .unwrap();
            let mut map = HashMap::new();
            map.insert("k".to_string(), "v".to_string());
            write_map(w.as_mut(), &map).unwrap();
            let data = w.into_bytes().freeze();

            let mut r = kind.reader(data, 1024);
            let list = Vec::<Bytes>::read(r.as_mut()).unwrap();
            assert_eq!(list, vec![Bytes::from_static(b"a"), Bytes::from_static(b"bc")]);
            let decoded = HashMap::<String, String>::read(r.as_mut()).unwrap();
            assert_eq!(decoded, map);
        }
    }

    #[test]
    fn test_list_element_type_mismatch() {
        let mut w = ProtocolKind::Binary.writer();
        write_list(w.as_mut(), &[1i32, 2]).unwrap();
        let mut r = ProtocolKind::Binary.reader(w.into_bytes().freeze(), 1024);
        let result = Vec::<i64>::read(r.as_mut());
        assert!(matches!(
            result,
            Err(ProtocolError::TypeMismatch {
                expected: TType::I64,
                found: TType::I32
            })
        ));
    }

    #[test]
    fn test_empty_list_ignores_element_type() {
        let mut w = ProtocolKind::Compact.writer();
        write_list::<i32>(w.as_mut(), &[]).unwrap();
        let mut r = ProtocolKind::Compact.reader(w.into_bytes().freeze(), 1024);
        assert!(Vec::<Bytes>::read(r.as_mut()).unwrap().is_empty());
    }

    #[test]
    fn test_read_field_skips_mismatched_type() {
        let mut w = ProtocolKind::Binary.writer();
        write_field(w.as_mut(), 1, "not a number").unwrap();
        write_field(w.as_mut(), 2, &42i64).unwrap();
        let mut r = ProtocolKind::Binary.reader(w.into_bytes().freeze(), 1024);

        let field = r.read_field_begin().unwrap();
        assert_eq!(read_field::<i64>(r.as_mut(), field).unwrap(), None);
        let field = r.read_field_begin().unwrap();
        assert_eq!(read_field::<i64>(r.as_mut(), field).unwrap(), Some(42));
    }

    #[test]
    fn test_read_text_is_lossy() {
        let mut w = ProtocolKind::Binary.writer();
        w.write_binary(b"cf:\xffq").unwrap();
        let mut r = ProtocolKind::Binary.reader(w.into_bytes().freeze(), 1024);
        assert_eq!(read_text(r.as_mut()).unwrap(), "cf:\u{fffd}q");
    }
}
