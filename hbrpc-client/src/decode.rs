//! Best-effort decoding of cell values into typed destinations.
//!
//! Cell values travel as raw bytes holding the textual form of the value
//! (`"42"`, `"3.5"`, `"true"`). [`decode_columns`] binds field names to
//! destinations by position and coerces each present cell according to the
//! destination's kind. Malformed numbers and booleans decode to zero/false,
//! integers beyond 64 bits saturate and narrower integers wrap. Only
//! unsupported destinations fail.

use bytes::Bytes;
use hbrpc_protocol::{Cell, RowResult};
use std::collections::HashMap;
use std::num::IntErrorKind;
use thiserror::Error;

/// Result decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("can't scan value of type {type_name} with value {value}")]
    UnsupportedDestination { type_name: String, value: String },

    #[error("{fields} field names but {destinations} destinations")]
    LengthMismatch { fields: usize, destinations: usize },
}

/// Coarse classification of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Int,
    Float,
    Bool,
    Text,
    Bytes,
    Unsupported,
}

/// A typed slot that a cell value is written into.
#[derive(Debug)]
pub enum Destination<'a> {
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Isize(&'a mut isize),
    F32(&'a mut f32),
    F64(&'a mut f64),
    Bool(&'a mut bool),
    Text(&'a mut String),
    Bytes(&'a mut Bytes),
    /// A destination type with no decoding rule. Decoding into it fails.
    Unsupported { type_name: &'static str },
}

impl<'a> Destination<'a> {
    /// Placeholder for a destination of type `T` that cannot be decoded.
    pub fn unsupported<T: ?Sized>() -> Self {
        Destination::Unsupported {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::I8(_)
            | Destination::I16(_)
            | Destination::I32(_)
            | Destination::I64(_)
            | Destination::Isize(_) => DestinationKind::Int,
            Destination::F32(_) | Destination::F64(_) => DestinationKind::Float,
            Destination::Bool(_) => DestinationKind::Bool,
            Destination::Text(_) => DestinationKind::Text,
            Destination::Bytes(_) => DestinationKind::Bytes,
            Destination::Unsupported { .. } => DestinationKind::Unsupported,
        }
    }

    /// Writes `raw` into the destination.
    fn assign(&mut self, raw: &Bytes) -> Result<(), DecodeError> {
        let text = String::from_utf8_lossy(raw);
        match self {
            Destination::I8(d) => **d = parse_int(&text) as i8,
            Destination::I16(d) => **d = parse_int(&text) as i16,
            Destination::I32(d) => **d = parse_int(&text) as i32,
            Destination::I64(d) => **d = parse_int(&text),
            Destination::Isize(d) => **d = parse_int(&text) as isize,
            Destination::F32(d) => **d = text.parse().unwrap_or(0.0),
            Destination::F64(d) => **d = text.parse().unwrap_or(0.0),
            Destination::Bool(d) => **d = parse_bool(&text).unwrap_or(false),
            Destination::Text(d) => **d = text.into_owned(),
            Destination::Bytes(d) => **d = raw.clone(),
            Destination::Unsupported { type_name } => {
                return Err(DecodeError::UnsupportedDestination {
                    type_name: (*type_name).to_string(),
                    value: text.into_owned(),
                });
            }
        }
        Ok(())
    }
}

/// Parses decimal text as 64 bits, saturating out-of-range values at the
/// `i64` bounds. Narrower destinations keep the low bits.
fn parse_int(text: &str) -> i64 {
    match text.parse::<i64>() {
        Ok(v) => v,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => 0,
        },
    }
}

macro_rules! destination_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a mut $ty> for Destination<'a> {
                fn from(d: &'a mut $ty) -> Self {
                    Destination::$variant(d)
                }
            }
        )*
    };
}

destination_from!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Text,
    Bytes => Bytes,
);

/// Boolean text grammar: `1 t T TRUE true True` and `0 f F FALSE false False`.
fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Decodes the named cells of `columns` into `destinations`.
///
/// `fields[i]` is written into `destinations[i]`. Fields missing from
/// `columns` leave their destination untouched.
pub fn decode_columns(
    columns: &HashMap<String, Cell>,
    fields: &[&str],
    destinations: &mut [Destination<'_>],
) -> Result<(), DecodeError> {
    if fields.len() != destinations.len() {
        return Err(DecodeError::LengthMismatch {
            fields: fields.len(),
            destinations: destinations.len(),
        });
    }

    for (name, dest) in fields.iter().zip(destinations.iter_mut()) {
        if let Some(cell) = columns.get(*name) {
            dest.assign(&cell.value)?;
        }
    }
    Ok(())
}

/// Decoding straight from a fetched row.
pub trait DecodeRow {
    fn decode_into(
        &self,
        fields: &[&str],
        destinations: &mut [Destination<'_>],
    ) -> Result<(), DecodeError>;
}

impl DecodeRow for RowResult {
    fn decode_into(
        &self,
        fields: &[&str],
        destinations: &mut [Destination<'_>],
    ) -> Result<(), DecodeError> {
        decode_columns(&self.columns, fields, destinations)
    }
}
