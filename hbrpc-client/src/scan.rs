//! Scanner parameters.

use bytes::Bytes;
use hbrpc_protocol::Scan;

/// Parameters for `scannerOpenWithScan`.
///
/// A field holding its zero value (empty, `0`) counts as unset and is left
/// out of the wire request. Start and stop rows are always sent; empty
/// means unbounded. Timestamp, caching and batch size are sent only when
/// strictly positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    pub start_row: Bytes,
    pub stop_row: Bytes,
    pub timestamp: i64,
    pub columns: Vec<String>,
    pub caching: i32,
    pub filter_string: String,
    pub batch_size: i32,
}

impl ScanRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_row(mut self, row: impl Into<Bytes>) -> Self {
        self.start_row = row.into();
        self
    }

    pub fn with_stop_row(mut self, row: impl Into<Bytes>) -> Self {
        self.stop_row = row.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_caching(mut self, rows: i32) -> Self {
        self.caching = rows;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_string = filter.into();
        self
    }

    pub fn with_batch_size(mut self, size: i32) -> Self {
        self.batch_size = size;
        self
    }

    /// Maps to the wire struct, dropping unset fields.
    pub fn to_wire(&self) -> Scan {
        Scan {
            start_row: Some(self.start_row.clone()),
            stop_row: Some(self.stop_row.clone()),
            timestamp: (self.timestamp > 0).then_some(self.timestamp),
            columns: (!self.columns.is_empty()).then(|| {
                self.columns
                    .iter()
                    .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                    .collect()
            }),
            caching: (self.caching > 0).then_some(self.caching),
            filter_string: (!self.filter_string.is_empty())
                .then(|| Bytes::copy_from_slice(self.filter_string.as_bytes())),
            batch_size: (self.batch_size > 0).then_some(self.batch_size),
        }
    }
}

impl From<Scan> for ScanRequest {
    /// Rebuilds a request from a wire struct; absent fields become zero.
    fn from(scan: Scan) -> Self {
        Self {
            start_row: scan.start_row.unwrap_or_default(),
            stop_row: scan.stop_row.unwrap_or_default(),
            timestamp: scan.timestamp.unwrap_or_default(),
            columns: scan
                .columns
                .unwrap_or_default()
                .iter()
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect(),
            caching: scan.caching.unwrap_or_default(),
            filter_string: scan
                .filter_string
                .map(|f| String::from_utf8_lossy(&f).into_owned())
                .unwrap_or_default(),
            batch_size: scan.batch_size.unwrap_or_default(),
        }
    }
}
