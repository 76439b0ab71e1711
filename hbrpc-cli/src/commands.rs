//! Command execution.

use crate::Commands;
use colored::Colorize;
use hbrpc_client::{Client, ColumnDescriptor, Mutation, RegionInfo, RowResult, ScanRequest};
use serde_json::{json, Value};

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
    as_json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ping => {
            client.keep_alive().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Tables => {
            let names = client.table_names().await?;
            if as_json {
                return Ok(format_json(&json!(names)));
            }
            if names.is_empty() {
                return Ok("No tables".yellow().to_string());
            }
            Ok(names
                .iter()
                .map(|n| format!("  {}", n.cyan()))
                .collect::<Vec<_>>()
                .join("\n"))
        }

        Commands::Describe { table } => {
            let families = client.column_descriptors(&table).await?;
            let mut names: Vec<_> = families.keys().cloned().collect();
            names.sort();

            if as_json {
                let items: Vec<Value> = names
                    .iter()
                    .map(|n| descriptor_json(&families[n]))
                    .collect();
                return Ok(format_json(&Value::Array(items)));
            }

            let mut output = format!("Table {}", table.cyan()).bold().to_string();
            for name in &names {
                let d = &families[name];
                output.push_str(&format!(
                    "\n  {} versions={} compression={} in_memory={} bloom={} ttl={}",
                    name.yellow(),
                    d.max_versions,
                    d.compression,
                    d.in_memory,
                    d.bloom_filter_type,
                    d.time_to_live
                ));
            }
            Ok(output)
        }

        Commands::Regions { table } => {
            let regions = client.table_regions(&table).await?;
            if as_json {
                let items: Vec<Value> = regions.iter().map(region_json).collect();
                return Ok(format_json(&Value::Array(items)));
            }

            let mut output = format!("Table {} ({} regions)", table.cyan(), regions.len())
                .bold()
                .to_string();
            for r in &regions {
                output.push_str(&format!(
                    "\n  [{}, {}) id={} server={}:{}",
                    text(&r.start_key),
                    text(&r.end_key),
                    r.id,
                    r.server_name,
                    r.port
                ));
            }
            Ok(output)
        }

        Commands::Get {
            table,
            row,
            columns,
        } => {
            let rows = if columns.is_empty() {
                client.get_row(&table, row.as_bytes(), None).await?
            } else {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                client
                    .get_row_with_columns(&table, row.as_bytes(), &columns, None)
                    .await?
            };
            if rows.is_empty() && !as_json {
                return Ok(format!("Row {} not found", row.cyan()).yellow().to_string());
            }
            Ok(format_rows(&rows, as_json))
        }

        Commands::Scan {
            table,
            start,
            stop,
            prefix,
            columns,
            filter,
            limit,
            batch,
        } => {
            let id = match prefix {
                Some(prefix) => {
                    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                    client
                        .scanner_open_with_prefix(&table, prefix.as_bytes(), &columns, None)
                        .await?
                }
                None => {
                    let mut scan = ScanRequest::new()
                        .with_columns(columns)
                        .with_caching(batch);
                    if let Some(start) = start {
                        scan = scan.with_start_row(start);
                    }
                    if let Some(stop) = stop {
                        scan = scan.with_stop_row(stop);
                    }
                    if let Some(filter) = filter {
                        scan = scan.with_filter(filter);
                    }
                    client.scanner_open_with_scan(&table, &scan, None).await?
                }
            };
            tracing::debug!("Opened scanner {}", id);

            // Drain up to `limit` rows, closing the scanner on every path.
            let mut rows = Vec::new();
            let drained = async {
                while rows.len() < limit {
                    let left = i32::try_from(limit - rows.len()).unwrap_or(i32::MAX);
                    let want = batch.min(left).max(1);
                    let chunk = client.scanner_get_list(id, want).await?;
                    if chunk.is_empty() {
                        break;
                    }
                    rows.extend(chunk);
                }
                Ok::<_, hbrpc_client::HbaseError>(())
            }
            .await;
            if let Err(e) = client.scanner_close(id).await {
                tracing::warn!("Closing scanner {} failed: {}", id, e);
            }
            drained?;

            rows.truncate(limit);
            if rows.is_empty() && !as_json {
                return Ok("No rows".yellow().to_string());
            }
            Ok(format_rows(&rows, as_json))
        }

        Commands::Put {
            table,
            row,
            column,
            value,
        } => {
            client
                .mutate_row(
                    &table,
                    row.as_bytes(),
                    &[Mutation::put(column.as_str(), value)],
                    None,
                )
                .await?;
            Ok(format!("{} {} {}", "Put".green(), row.cyan(), column))
        }

        Commands::Delete { table, row, column } => match column {
            Some(column) => {
                client
                    .delete_all(&table, row.as_bytes(), &column, None)
                    .await?;
                Ok(format!("{} {} {}", "Deleted".green(), row.cyan(), column))
            }
            None => {
                client.delete_all_row(&table, row.as_bytes(), None).await?;
                Ok(format!("{} row {}", "Deleted".green(), row.cyan()))
            }
        },

        Commands::Incr {
            table,
            row,
            column,
            by,
        } => {
            let value = client
                .atomic_increment(&table, row.as_bytes(), &column, by)
                .await?;
            if as_json {
                return Ok(format_json(&json!({ "value": value })));
            }
            Ok(value.to_string())
        }
    }
}

fn text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn row_json(row: &RowResult) -> Value {
    let columns: serde_json::Map<String, Value> = row
        .columns
        .iter()
        .map(|(name, cell)| {
            (
                name.clone(),
                json!({ "value": text(&cell.value), "timestamp": cell.timestamp }),
            )
        })
        .collect();
    json!({ "row": text(&row.row), "columns": columns })
}

fn descriptor_json(d: &ColumnDescriptor) -> Value {
    json!({
        "name": d.name,
        "max_versions": d.max_versions,
        "compression": d.compression,
        "in_memory": d.in_memory,
        "bloom_filter_type": d.bloom_filter_type,
        "block_cache_enabled": d.block_cache_enabled,
        "time_to_live": d.time_to_live,
    })
}

fn region_json(r: &RegionInfo) -> Value {
    json!({
        "start_key": text(&r.start_key),
        "end_key": text(&r.end_key),
        "id": r.id,
        "name": text(&r.name),
        "version": r.version,
        "server_name": r.server_name,
        "port": r.port,
    })
}

fn format_rows(rows: &[RowResult], as_json: bool) -> String {
    if as_json {
        return format_json(&Value::Array(rows.iter().map(row_json).collect()));
    }

    let mut output = String::new();
    for row in rows {
        let mut columns: Vec<_> = row.columns.iter().collect();
        columns.sort_by(|a, b| a.0.cmp(b.0));

        output.push_str(&text(&row.row).cyan().bold().to_string());
        output.push('\n');
        for (name, cell) in columns {
            output.push_str(&format!(
                "  {} = {} {}\n",
                name.yellow(),
                text(&cell.value),
                format!("@{}", cell.timestamp).dimmed()
            ));
        }
    }
    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbrpc_client::Cell;
    use std::collections::HashMap;

    fn sample_row() -> RowResult {
        let mut columns = HashMap::new();
        columns.insert("cf:b".to_string(), Cell::new("2", 20));
        columns.insert("cf:a".to_string(), Cell::new("1", 10));
        RowResult {
            row: "r1".into(),
            columns,
        }
    }

    #[test]
    fn test_row_json() {
        let value = row_json(&sample_row());
        assert_eq!(value["row"], "r1");
        assert_eq!(value["columns"]["cf:a"]["value"], "1");
        assert_eq!(value["columns"]["cf:b"]["timestamp"], 20);
    }

    #[test]
    fn test_format_rows_sorted() {
        colored::control::set_override(false);
        let output = format_rows(&[sample_row()], false);
        assert_eq!(output, "r1\n  cf:a = 1 @10\n  cf:b = 2 @20");
    }

    #[test]
    fn test_descriptor_json() {
        let value = descriptor_json(&ColumnDescriptor::new("cf"));
        assert_eq!(value["max_versions"], 3);
        assert_eq!(value["compression"], "NONE");
        assert_eq!(value["time_to_live"], -1);
    }
}
