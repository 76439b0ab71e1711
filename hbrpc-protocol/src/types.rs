//! HBase Thrift gateway structs.
//!
//! Field ids follow the gateway's IDL. Names and column identifiers are
//! declared as `Text` (raw bytes) on the wire; they surface here as
//! `String` where they are names and as `Bytes` where they are row data.

use crate::error::{ApplicationErrorKind, ProtocolError};
use crate::protocol::{skip, ProtocolReader, ProtocolWriter};
use crate::value::{read_field, read_text, write_field, write_list_field, ReadValue, WriteValue};
use crate::wire::TType;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Reads a struct by dispatching each field to `on_field`.
///
/// `on_field` returns `false` for fields it does not consume, which are
/// then skipped.
fn read_struct<F>(r: &mut dyn ProtocolReader, mut on_field: F) -> Result<(), ProtocolError>
where
    F: FnMut(&mut dyn ProtocolReader, crate::wire::FieldHeader) -> Result<bool, ProtocolError>,
{
    r.read_struct_begin()?;
    loop {
        let field = r.read_field_begin()?;
        if field.is_stop() {
            break;
        }
        if !on_field(r, field)? {
            skip(r, field.field_type)?;
        }
    }
    r.read_struct_end()
}

fn write_struct<F>(w: &mut dyn ProtocolWriter, fields: F) -> Result<(), ProtocolError>
where
    F: FnOnce(&mut dyn ProtocolWriter) -> Result<(), ProtocolError>,
{
    w.write_struct_begin()?;
    fields(w)?;
    w.write_field_stop()?;
    w.write_struct_end()
}

/// Reads a `Text` field as a lossy string; mismatched types are skipped.
fn text_field(
    r: &mut dyn ProtocolReader,
    field: crate::wire::FieldHeader,
) -> Result<Option<String>, ProtocolError> {
    if field.field_type == TType::Binary {
        Ok(Some(read_text(r)?))
    } else {
        skip(r, field.field_type)?;
        Ok(None)
    }
}

macro_rules! struct_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WriteValue for $ty {
                const TTYPE: TType = TType::Struct;

                fn write(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
                    self.write_fields(w)
                }
            }
        )*
    };
}

/// A cell value together with the timestamp it was stored with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub value: Bytes,
    pub timestamp: i64,
}

impl Cell {
    pub fn new(value: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }

    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, &self.value)?;
            write_field(w, 2, &self.timestamp)
        })
    }
}

impl ReadValue for Cell {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut cell = Cell::default();
        read_struct(r, |r, field| {
            match field.id {
                1 => cell.value = read_field(r, field)?.unwrap_or_default(),
                2 => cell.timestamp = read_field(r, field)?.unwrap_or_default(),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(cell)
    }
}

/// One row: its key and a map of column name to cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowResult {
    pub row: Bytes,
    pub columns: HashMap<String, Cell>,
}

impl RowResult {
    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, &self.row)?;
            w.write_field_begin(TType::Map, 2)?;
            w.write_map_begin(TType::Binary, TType::Struct, self.columns.len())?;
            for (name, cell) in &self.columns {
                w.write_string(name)?;
                cell.write(w)?;
            }
            Ok(())
        })
    }
}

impl ReadValue for RowResult {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut result = RowResult::default();
        read_struct(r, |r, field| {
            match (field.id, field.field_type) {
                (1, TType::Binary) => result.row = r.read_binary()?,
                (2, TType::Map) => {
                    let (_, _, size) = r.read_map_begin()?;
                    for _ in 0..size {
                        let name = read_text(r)?;
                        let cell = Cell::read(r)?;
                        result.columns.insert(name, cell);
                    }
                }
                // sortedColumns: list<TColumn{1: columnName, 2: cell}>
                (3, TType::List) => {
                    let (_, size) = r.read_list_begin()?;
                    for _ in 0..size {
                        let mut name = None;
                        let mut cell = None;
                        read_struct(r, |r, field| {
                            match field.id {
                                1 => name = text_field(r, field)?,
                                2 => cell = read_field::<Cell>(r, field)?,
                                _ => return Ok(false),
                            }
                            Ok(true)
                        })?;
                        if let (Some(name), Some(cell)) = (name, cell) {
                            result.columns.insert(name, cell);
                        }
                    }
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(result)
    }
}

/// Column family settings, used when creating a table or describing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub max_versions: i32,
    pub compression: String,
    pub in_memory: bool,
    pub bloom_filter_type: String,
    pub bloom_filter_vector_size: i32,
    pub bloom_filter_nb_hashes: i32,
    pub block_cache_enabled: bool,
    pub time_to_live: i32,
}

impl ColumnDescriptor {
    /// Creates a descriptor with the gateway's customary defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_versions: 3,
            compression: "NONE".to_string(),
            in_memory: false,
            bloom_filter_type: "NONE".to_string(),
            bloom_filter_vector_size: 0,
            bloom_filter_nb_hashes: 0,
            block_cache_enabled: false,
            time_to_live: -1,
        }
    }

    pub fn with_max_versions(mut self, versions: i32) -> Self {
        self.max_versions = versions;
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = compression.into();
        self
    }

    pub fn with_in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn with_time_to_live(mut self, seconds: i32) -> Self {
        self.time_to_live = seconds;
        self
    }

    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, self.name.as_str())?;
            write_field(w, 2, &self.max_versions)?;
            write_field(w, 3, self.compression.as_str())?;
            write_field(w, 4, &self.in_memory)?;
            write_field(w, 5, self.bloom_filter_type.as_str())?;
            write_field(w, 6, &self.bloom_filter_vector_size)?;
            write_field(w, 7, &self.bloom_filter_nb_hashes)?;
            write_field(w, 8, &self.block_cache_enabled)?;
            write_field(w, 9, &self.time_to_live)
        })
    }
}

impl ReadValue for ColumnDescriptor {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut desc = ColumnDescriptor::new("");
        read_struct(r, |r, field| {
            match field.id {
                1 => desc.name = text_field(r, field)?.unwrap_or_default(),
                2 => desc.max_versions = read_field(r, field)?.unwrap_or(desc.max_versions),
                3 => desc.compression = text_field(r, field)?.unwrap_or_default(),
                4 => desc.in_memory = read_field(r, field)?.unwrap_or_default(),
                5 => desc.bloom_filter_type = text_field(r, field)?.unwrap_or_default(),
                6 => desc.bloom_filter_vector_size = read_field(r, field)?.unwrap_or_default(),
                7 => desc.bloom_filter_nb_hashes = read_field(r, field)?.unwrap_or_default(),
                8 => desc.block_cache_enabled = read_field(r, field)?.unwrap_or_default(),
                9 => desc.time_to_live = read_field(r, field)?.unwrap_or(desc.time_to_live),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(desc)
    }
}

/// Location and identity of one table region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionInfo {
    pub start_key: Bytes,
    pub end_key: Bytes,
    pub id: i64,
    pub name: Bytes,
    pub version: i8,
    pub server_name: String,
    pub port: i32,
}

impl RegionInfo {
    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, &self.start_key)?;
            write_field(w, 2, &self.end_key)?;
            write_field(w, 3, &self.id)?;
            write_field(w, 4, &self.name)?;
            write_field(w, 5, &self.version)?;
            write_field(w, 6, self.server_name.as_str())?;
            write_field(w, 7, &self.port)
        })
    }
}

impl ReadValue for RegionInfo {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut info = RegionInfo::default();
        read_struct(r, |r, field| {
            match field.id {
                1 => info.start_key = read_field(r, field)?.unwrap_or_default(),
                2 => info.end_key = read_field(r, field)?.unwrap_or_default(),
                3 => info.id = read_field(r, field)?.unwrap_or_default(),
                4 => info.name = read_field(r, field)?.unwrap_or_default(),
                5 => info.version = read_field(r, field)?.unwrap_or_default(),
                6 => info.server_name = text_field(r, field)?.unwrap_or_default(),
                7 => info.port = read_field(r, field)?.unwrap_or_default(),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(info)
    }
}

/// Update or delete of one column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub is_delete: bool,
    pub column: String,
    pub value: Bytes,
    pub write_to_wal: bool,
}

impl Mutation {
    /// Stores `value` in `column`, written to the WAL.
    pub fn put(column: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            is_delete: false,
            column: column.into(),
            value: value.into(),
            write_to_wal: true,
        }
    }

    /// Deletes `column`.
    pub fn delete(column: impl Into<String>) -> Self {
        Self {
            is_delete: true,
            column: column.into(),
            value: Bytes::new(),
            write_to_wal: true,
        }
    }

    pub fn without_wal(mut self) -> Self {
        self.write_to_wal = false;
        self
    }

    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, &self.is_delete)?;
            write_field(w, 2, self.column.as_str())?;
            write_field(w, 3, &self.value)?;
            write_field(w, 4, &self.write_to_wal)
        })
    }
}

impl ReadValue for Mutation {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut m = Mutation::put("", Bytes::new());
        read_struct(r, |r, field| {
            match field.id {
                1 => m.is_delete = read_field(r, field)?.unwrap_or_default(),
                2 => m.column = text_field(r, field)?.unwrap_or_default(),
                3 => m.value = read_field(r, field)?.unwrap_or_default(),
                4 => m.write_to_wal = read_field(r, field)?.unwrap_or(true),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(m)
    }
}

/// A set of mutations applied to one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMutation {
    pub row: Bytes,
    pub mutations: Vec<Mutation>,
}

impl BatchMutation {
    pub fn new(row: impl Into<Bytes>, mutations: Vec<Mutation>) -> Self {
        Self {
            row: row.into(),
            mutations,
        }
    }

    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, &self.row)?;
            write_list_field(w, 2, &self.mutations)
        })
    }
}

impl ReadValue for BatchMutation {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut batch = BatchMutation::default();
        read_struct(r, |r, field| {
            match field.id {
                1 => batch.row = read_field(r, field)?.unwrap_or_default(),
                2 => batch.mutations = read_field(r, field)?.unwrap_or_default(),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(batch)
    }
}

/// Increment of one counter column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Increment {
    pub table: String,
    pub row: Bytes,
    pub column: String,
    pub amount: i64,
}

impl Increment {
    pub fn new(
        table: impl Into<String>,
        row: impl Into<Bytes>,
        column: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
            column: column.into(),
            amount,
        }
    }

    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, self.table.as_str())?;
            write_field(w, 2, &self.row)?;
            write_field(w, 3, self.column.as_str())?;
            write_field(w, 4, &self.amount)
        })
    }
}

impl ReadValue for Increment {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut inc = Increment::default();
        read_struct(r, |r, field| {
            match field.id {
                1 => inc.table = text_field(r, field)?.unwrap_or_default(),
                2 => inc.row = read_field(r, field)?.unwrap_or_default(),
                3 => inc.column = text_field(r, field)?.unwrap_or_default(),
                4 => inc.amount = read_field(r, field)?.unwrap_or_default(),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(inc)
    }
}

/// Scanner parameters as sent on the wire. Absent fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub start_row: Option<Bytes>,
    pub stop_row: Option<Bytes>,
    pub timestamp: Option<i64>,
    pub columns: Option<Vec<Bytes>>,
    pub caching: Option<i32>,
    pub filter_string: Option<Bytes>,
    pub batch_size: Option<i32>,
}

impl Scan {
    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            if let Some(ref v) = self.start_row {
                write_field(w, 1, v)?;
            }
            if let Some(ref v) = self.stop_row {
                write_field(w, 2, v)?;
            }
            if let Some(ref v) = self.timestamp {
                write_field(w, 3, v)?;
            }
            if let Some(ref v) = self.columns {
                write_list_field(w, 4, v)?;
            }
            if let Some(ref v) = self.caching {
                write_field(w, 5, v)?;
            }
            if let Some(ref v) = self.filter_string {
                write_field(w, 6, v)?;
            }
            if let Some(ref v) = self.batch_size {
                write_field(w, 7, v)?;
            }
            Ok(())
        })
    }
}

impl ReadValue for Scan {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut scan = Scan::default();
        read_struct(r, |r, field| {
            match field.id {
                1 => scan.start_row = read_field(r, field)?,
                2 => scan.stop_row = read_field(r, field)?,
                3 => scan.timestamp = read_field(r, field)?,
                4 => scan.columns = read_field(r, field)?,
                5 => scan.caching = read_field(r, field)?,
                6 => scan.filter_string = read_field(r, field)?,
                7 => scan.batch_size = read_field(r, field)?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(scan)
    }
}

macro_rules! message_exception {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            pub message: String,
        }

        impl $name {
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                }
            }

            fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
                write_struct(w, |w| write_field(w, 1, self.message.as_str()))
            }
        }

        impl ReadValue for $name {
            const TTYPE: TType = TType::Struct;

            fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
                let mut e = $name::default();
                read_struct(r, |r, field| {
                    if field.id != 1 {
                        return Ok(false);
                    }
                    e.message = text_field(r, field)?.unwrap_or_default();
                    Ok(true)
                })?;
                Ok(e)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.message)
            }
        }
    };
}

message_exception!(
    /// General failure talking to the master or a region server.
    IoError
);
message_exception!(
    /// An argument was rejected by the server.
    IllegalArgument
);
message_exception!(
    /// The table being created already exists.
    AlreadyExists
);

/// Failure reported by the Thrift layer itself instead of a declared exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    pub message: String,
    pub kind: ApplicationErrorKind,
}

impl ApplicationException {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn write_fields(&self, w: &mut dyn ProtocolWriter) -> Result<(), ProtocolError> {
        write_struct(w, |w| {
            write_field(w, 1, self.message.as_str())?;
            write_field(w, 2, &self.kind.as_i32())
        })
    }
}

impl ReadValue for ApplicationException {
    const TTYPE: TType = TType::Struct;

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut e = ApplicationException::new(ApplicationErrorKind::Unknown, "");
        read_struct(r, |r, field| {
            match field.id {
                1 => e.message = text_field(r, field)?.unwrap_or_default(),
                2 => {
                    if let Some(kind) = read_field::<i32>(r, field)? {
                        e.kind = ApplicationErrorKind::from_i32(kind);
                    }
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(e)
    }
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

struct_value!(
    Cell,
    RowResult,
    ColumnDescriptor,
    RegionInfo,
    Mutation,
    BatchMutation,
    Increment,
    Scan,
    IoError,
    IllegalArgument,
    AlreadyExists,
    ApplicationException,
);
