//! High-level client API.
//!
//! Every method maps one-to-one onto a gateway call. Arguments are written
//! with the gateway's field ids; failures come back as [`HbaseError`].

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use crate::scan::ScanRequest;
use crate::unified::{check_reply, HbaseError};
use bytes::Bytes;
use hbrpc_protocol::{
    ArgWriter, BatchMutation, Cell, ColumnDescriptor, Increment, Mutation, ProtocolError,
    ReadValue, RegionInfo, RowResult,
};
use std::collections::HashMap;
use std::fmt;

/// Per-call attributes forwarded to the gateway.
pub type Attributes = HashMap<String, String>;

/// Opaque id of a server-side scanner.
///
/// Scanners are not tracked by the connection; close every scanner you open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannerId(pub i32);

impl fmt::Display for ScannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// High-level client for the HBase Thrift gateway.
pub struct Client {
    conn: Connection,
}

impl Client {
    /// Creates a closed client. Fails on a malformed endpoint.
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        Ok(Self {
            conn: Connection::new(config)?,
        })
    }

    /// Connects with the binary protocol over a buffered socket.
    pub async fn dial(host: &str, port: u16) -> Result<Self, ClientError> {
        let mut client = Self::new(ConnectionConfig::socket(host, port))?;
        client.open().await?;
        Ok(client)
    }

    pub async fn open(&mut self) -> Result<(), ClientError> {
        self.conn.open().await
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checks the gateway answers by listing tables.
    pub async fn keep_alive(&mut self) -> Result<(), HbaseError> {
        self.table_names().await.map(|_| ())
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    async fn invoke<T, F>(&mut self, method: &str, args: F) -> Result<Option<T>, HbaseError>
    where
        T: ReadValue,
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        let reply = self.conn.call::<T, F>(method, args).await?;
        check_reply(reply)
    }

    async fn call_void<F>(&mut self, method: &str, args: F) -> Result<(), HbaseError>
    where
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        self.invoke::<(), F>(method, args).await.map(|_| ())
    }

    async fn call_value<T, F>(&mut self, method: &str, args: F) -> Result<T, HbaseError>
    where
        T: ReadValue,
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        self.invoke(method, args)
            .await?
            .ok_or_else(|| ClientError::MissingResult(method.to_string()).into())
    }

    // =========================================================================
    // Table administration
    // =========================================================================

    pub async fn enable_table(&mut self, table: &str) -> Result<(), HbaseError> {
        self.call_void("enableTable", |a| {
            a.field(1, table)?;
            Ok(())
        })
        .await
    }

    pub async fn disable_table(&mut self, table: &str) -> Result<(), HbaseError> {
        self.call_void("disableTable", |a| {
            a.field(1, table)?;
            Ok(())
        })
        .await
    }

    pub async fn is_table_enabled(&mut self, table: &str) -> Result<bool, HbaseError> {
        self.call_value("isTableEnabled", |a| {
            a.field(1, table)?;
            Ok(())
        })
        .await
    }

    pub async fn compact(&mut self, table_or_region: &str) -> Result<(), HbaseError> {
        self.call_void("compact", |a| {
            a.field(1, table_or_region)?;
            Ok(())
        })
        .await
    }

    pub async fn major_compact(&mut self, table_or_region: &str) -> Result<(), HbaseError> {
        self.call_void("majorCompact", |a| {
            a.field(1, table_or_region)?;
            Ok(())
        })
        .await
    }

    /// Lists user tables.
    pub async fn table_names(&mut self) -> Result<Vec<String>, HbaseError> {
        let names: Vec<Bytes> = self.call_value("getTableNames", |_| Ok(())).await?;
        Ok(names.iter().map(|n| lossy(n)).collect())
    }

    /// Column families of a table, keyed by family name.
    pub async fn column_descriptors(
        &mut self,
        table: &str,
    ) -> Result<HashMap<String, ColumnDescriptor>, HbaseError> {
        let families: HashMap<Bytes, ColumnDescriptor> = self
            .call_value("getColumnDescriptors", |a| {
                a.field(1, table)?;
                Ok(())
            })
            .await?;
        Ok(families
            .into_iter()
            .map(|(name, desc)| (lossy(&name), desc))
            .collect())
    }

    pub async fn table_regions(&mut self, table: &str) -> Result<Vec<RegionInfo>, HbaseError> {
        self.call_value("getTableRegions", |a| {
            a.field(1, table)?;
            Ok(())
        })
        .await
    }

    /// Creates a table. An existing table is reported on the generic
    /// channel as [`ClientError::AlreadyExists`].
    pub async fn create_table(
        &mut self,
        table: &str,
        families: &[ColumnDescriptor],
    ) -> Result<(), HbaseError> {
        self.call_void("createTable", |a| {
            a.field(1, table)?.list(2, families)?;
            Ok(())
        })
        .await
    }

    pub async fn delete_table(&mut self, table: &str) -> Result<(), HbaseError> {
        self.call_void("deleteTable", |a| {
            a.field(1, table)?;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Latest version of one cell.
    pub async fn get(
        &mut self,
        table: &str,
        row: &[u8],
        column: &str,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<Cell>, HbaseError> {
        self.call_value("get", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, column)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_ver(
        &mut self,
        table: &str,
        row: &[u8],
        column: &str,
        num_versions: i32,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<Cell>, HbaseError> {
        self.call_value("getVer", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, column)?
                .field(4, &num_versions)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_ver_ts(
        &mut self,
        table: &str,
        row: &[u8],
        column: &str,
        timestamp: i64,
        num_versions: i32,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<Cell>, HbaseError> {
        self.call_value("getVerTs", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, column)?
                .field(4, &timestamp)?
                .field(5, &num_versions)?
                .opt_map(6, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_row(
        &mut self,
        table: &str,
        row: &[u8],
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRow", |a| {
            a.field(1, table)?.field(2, row)?.opt_map(3, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_row_with_columns(
        &mut self,
        table: &str,
        row: &[u8],
        columns: &[&str],
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRowWithColumns", |a| {
            a.field(1, table)?
                .field(2, row)?
                .list(3, columns)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_row_ts(
        &mut self,
        table: &str,
        row: &[u8],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRowTs", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, &timestamp)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_row_with_columns_ts(
        &mut self,
        table: &str,
        row: &[u8],
        columns: &[&str],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRowWithColumnsTs", |a| {
            a.field(1, table)?
                .field(2, row)?
                .list(3, columns)?
                .field(4, &timestamp)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_rows(
        &mut self,
        table: &str,
        rows: &[&[u8]],
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRows", |a| {
            a.field(1, table)?.list(2, rows)?.opt_map(3, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_rows_with_columns(
        &mut self,
        table: &str,
        rows: &[&[u8]],
        columns: &[&str],
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRowsWithColumns", |a| {
            a.field(1, table)?
                .list(2, rows)?
                .list(3, columns)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_rows_ts(
        &mut self,
        table: &str,
        rows: &[&[u8]],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRowsTs", |a| {
            a.field(1, table)?
                .list(2, rows)?
                .field(3, &timestamp)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn get_rows_with_columns_ts(
        &mut self,
        table: &str,
        rows: &[&[u8]],
        columns: &[&str],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("getRowsWithColumnsTs", |a| {
            a.field(1, table)?
                .list(2, rows)?
                .list(3, columns)?
                .field(4, &timestamp)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
    }

    /// The row equal to or closest before `row`, restricted to `family`.
    pub async fn get_row_or_before(
        &mut self,
        table: &str,
        row: &[u8],
        family: &str,
    ) -> Result<Vec<Cell>, HbaseError> {
        self.call_value("getRowOrBefore", |a| {
            a.field(1, table)?.field(2, row)?.field(3, family)?;
            Ok(())
        })
        .await
    }

    /// Region holding `row`, where `row` is a fully qualified region key.
    pub async fn region_info(&mut self, row: &[u8]) -> Result<RegionInfo, HbaseError> {
        self.call_value("getRegionInfo", |a| {
            a.field(1, row)?;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn mutate_row(
        &mut self,
        table: &str,
        row: &[u8],
        mutations: &[Mutation],
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("mutateRow", |a| {
            a.field(1, table)?
                .field(2, row)?
                .list(3, mutations)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn mutate_row_ts(
        &mut self,
        table: &str,
        row: &[u8],
        mutations: &[Mutation],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("mutateRowTs", |a| {
            a.field(1, table)?
                .field(2, row)?
                .list(3, mutations)?
                .field(4, &timestamp)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn mutate_rows(
        &mut self,
        table: &str,
        batches: &[BatchMutation],
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("mutateRows", |a| {
            a.field(1, table)?.list(2, batches)?.opt_map(3, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn mutate_rows_ts(
        &mut self,
        table: &str,
        batches: &[BatchMutation],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("mutateRowsTs", |a| {
            a.field(1, table)?
                .list(2, batches)?
                .field(3, &timestamp)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    /// Adds `amount` to a counter cell and returns the new value.
    pub async fn atomic_increment(
        &mut self,
        table: &str,
        row: &[u8],
        column: &str,
        amount: i64,
    ) -> Result<i64, HbaseError> {
        self.call_value("atomicIncrement", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, column)?
                .field(4, &amount)?;
            Ok(())
        })
        .await
    }

    pub async fn delete_all(
        &mut self,
        table: &str,
        row: &[u8],
        column: &str,
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("deleteAll", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, column)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn delete_all_ts(
        &mut self,
        table: &str,
        row: &[u8],
        column: &str,
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("deleteAllTs", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, column)?
                .field(4, &timestamp)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn delete_all_row(
        &mut self,
        table: &str,
        row: &[u8],
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("deleteAllRow", |a| {
            a.field(1, table)?.field(2, row)?.opt_map(3, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn delete_all_row_ts(
        &mut self,
        table: &str,
        row: &[u8],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<(), HbaseError> {
        self.call_void("deleteAllRowTs", |a| {
            a.field(1, table)?
                .field(2, row)?
                .field(3, &timestamp)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
    }

    pub async fn increment(&mut self, increment: &Increment) -> Result<(), HbaseError> {
        self.call_void("increment", |a| {
            a.field(1, increment)?;
            Ok(())
        })
        .await
    }

    pub async fn increment_rows(&mut self, increments: &[Increment]) -> Result<(), HbaseError> {
        self.call_void("incrementRows", |a| {
            a.list(1, increments)?;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Scanners
    // =========================================================================

    pub async fn scanner_open_with_scan(
        &mut self,
        table: &str,
        scan: &ScanRequest,
        attributes: Option<&Attributes>,
    ) -> Result<ScannerId, HbaseError> {
        let wire = scan.to_wire();
        self.call_value("scannerOpenWithScan", |a| {
            a.field(1, table)?.field(2, &wire)?.opt_map(3, attributes)?;
            Ok(())
        })
        .await
        .map(ScannerId)
    }

    pub async fn scanner_open(
        &mut self,
        table: &str,
        start_row: &[u8],
        columns: &[&str],
        attributes: Option<&Attributes>,
    ) -> Result<ScannerId, HbaseError> {
        self.call_value("scannerOpen", |a| {
            a.field(1, table)?
                .field(2, start_row)?
                .list(3, columns)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
        .map(ScannerId)
    }

    pub async fn scanner_open_with_stop(
        &mut self,
        table: &str,
        start_row: &[u8],
        stop_row: &[u8],
        columns: &[&str],
        attributes: Option<&Attributes>,
    ) -> Result<ScannerId, HbaseError> {
        self.call_value("scannerOpenWithStop", |a| {
            a.field(1, table)?
                .field(2, start_row)?
                .field(3, stop_row)?
                .list(4, columns)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
        .map(ScannerId)
    }

    /// Scanner over all rows starting with `prefix`.
    pub async fn scanner_open_with_prefix(
        &mut self,
        table: &str,
        prefix: &[u8],
        columns: &[&str],
        attributes: Option<&Attributes>,
    ) -> Result<ScannerId, HbaseError> {
        self.call_value("scannerOpenWithPrefix", |a| {
            a.field(1, table)?
                .field(2, prefix)?
                .list(3, columns)?
                .opt_map(4, attributes)?;
            Ok(())
        })
        .await
        .map(ScannerId)
    }

    pub async fn scanner_open_ts(
        &mut self,
        table: &str,
        start_row: &[u8],
        columns: &[&str],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<ScannerId, HbaseError> {
        self.call_value("scannerOpenTs", |a| {
            a.field(1, table)?
                .field(2, start_row)?
                .list(3, columns)?
                .field(4, &timestamp)?
                .opt_map(5, attributes)?;
            Ok(())
        })
        .await
        .map(ScannerId)
    }

    pub async fn scanner_open_with_stop_ts(
        &mut self,
        table: &str,
        start_row: &[u8],
        stop_row: &[u8],
        columns: &[&str],
        timestamp: i64,
        attributes: Option<&Attributes>,
    ) -> Result<ScannerId, HbaseError> {
        self.call_value("scannerOpenWithStopTs", |a| {
            a.field(1, table)?
                .field(2, start_row)?
                .field(3, stop_row)?
                .list(4, columns)?
                .field(5, &timestamp)?
                .opt_map(6, attributes)?;
            Ok(())
        })
        .await
        .map(ScannerId)
    }

    /// Next row of a scanner; empty once the scanner is exhausted.
    pub async fn scanner_get(&mut self, id: ScannerId) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("scannerGet", |a| {
            a.field(1, &id.0)?;
            Ok(())
        })
        .await
    }

    /// Up to `nb_rows` rows of a scanner.
    pub async fn scanner_get_list(
        &mut self,
        id: ScannerId,
        nb_rows: i32,
    ) -> Result<Vec<RowResult>, HbaseError> {
        self.call_value("scannerGetList", |a| {
            a.field(1, &id.0)?.field(2, &nb_rows)?;
            Ok(())
        })
        .await
    }

    pub async fn scanner_close(&mut self, id: ScannerId) -> Result<(), HbaseError> {
        self.call_void("scannerClose", |a| {
            a.field(1, &id.0)?;
            Ok(())
        })
        .await
    }
}

fn lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let mut client = Client::new(ConnectionConfig::socket("127.0.0.1", 9)).unwrap();
        assert!(!client.is_open());

        let err = client.enable_table("t1").await.unwrap_err();
        assert!(err.is_not_open());
        assert_eq!(err.to_string(), "Error:connection not open;");

        let err = client.keep_alive().await.unwrap_err();
        assert!(err.is_not_open());

        let err = client.scanner_get(ScannerId(3)).await.unwrap_err();
        assert!(err.is_not_open());
    }

    #[test]
    fn test_scanner_id_display() {
        assert_eq!(ScannerId(17).to_string(), "17");
    }
}
