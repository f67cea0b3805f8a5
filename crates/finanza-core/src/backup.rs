//! JSON backup of the local cache.
//!
//! A backup is one JSON object keyed by remote table name, each holding an
//! array of wire-format rows.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{Record, RecordId, TableName};
use crate::store::LocalStore;
use crate::util::{format_timestamp, timestamp_now};

/// Outcome of [`import_json`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    /// One message per rejected row or table
    pub errors: Vec<String>,
}

/// Render every live record of `user_id` as pretty-printed JSON.
pub async fn export_json(store: &dyn LocalStore, user_id: &str) -> Result<String> {
    // serde_json's Map sorts keys; keep table order explicit instead.
    let mut output = String::from("{");
    for (index, table) in TableName::ALL.into_iter().enumerate() {
        let rows: Vec<Value> = store
            .get_all(table, user_id)
            .await?
            .iter()
            .map(Record::to_remote_payload)
            .collect();
        if index > 0 {
            output.push(',');
        }
        output.push_str("\n  ");
        output.push_str(&serde_json::to_string(table.as_str())?);
        output.push_str(": ");
        let rendered = serde_json::to_string_pretty(&rows)?;
        output.push_str(&rendered.replace('\n', "\n  "));
    }
    output.push_str("\n}\n");

    tracing::info!(user_id, "Exported local backup");
    Ok(output)
}

/// Load a backup produced by [`export_json`] into the local store.
///
/// Every row is stored as a pending change owned by `user_id`. Backed-up
/// rows may already exist remotely, so they are treated as remote records:
/// the next sync only overwrites an older remote copy and a later delete is
/// sent to the remote. Rows that cannot be decoded are reported and skipped.
pub async fn import_json(
    store: &dyn LocalStore,
    user_id: &str,
    payload: &str,
) -> Result<ImportReport> {
    let document: Map<String, Value> = match serde_json::from_str(payload)? {
        Value::Object(document) => document,
        _ => {
            return Err(Error::InvalidInput(
                "Backup must be a JSON object keyed by table".into(),
            ))
        }
    };

    let mut report = ImportReport::default();
    for (key, rows) in document {
        let table = match key.parse::<TableName>() {
            Ok(table) => table,
            Err(error) => {
                report.failed += rows.as_array().map_or(1, Vec::len);
                report.errors.push(error.to_string());
                continue;
            }
        };
        let Value::Array(rows) = rows else {
            report.failed += 1;
            report
                .errors
                .push(format!("{table}: expected an array of rows"));
            continue;
        };

        for (index, row) in rows.into_iter().enumerate() {
            match import_row(table, user_id, row) {
                Ok(record) => {
                    store.put(table, &record).await?;
                    report.imported += 1;
                }
                Err(error) => {
                    report.failed += 1;
                    report.errors.push(format!("{table}[{index}]: {error}"));
                }
            }
        }
    }

    tracing::info!(
        imported = report.imported,
        failed = report.failed,
        "Imported backup"
    );
    Ok(report)
}

fn import_row(table: TableName, user_id: &str, row: Value) -> Result<Record> {
    let Value::Object(mut row) = row else {
        return Err(Error::InvalidInput("row is not a JSON object".into()));
    };

    let has_id = row
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        row.insert("id".into(), Value::String(RecordId::new().to_string()));
    }
    row.insert("user_id".into(), Value::String(user_id.to_string()));

    let created_at = row
        .get("created_at")
        .filter(|value| value.is_string())
        .cloned()
        .unwrap_or_else(|| Value::String(format_timestamp(&timestamp_now())));
    row.insert("created_at".into(), created_at.clone());
    if !row.get("updated_at").is_some_and(Value::is_string) {
        row.insert("updated_at".into(), created_at);
    }

    let mut record = Record::from_remote(Value::Object(row))?;
    record.synced = false;
    record.on_remote = true;
    record.fill_month_ref(table);
    Ok(record)
}

/// Default file name for a backup taken at `timestamp_ms`
#[must_use]
pub fn suggested_backup_file_name(timestamp_ms: i64) -> String {
    format!("finanza-backup-{timestamp_ms}.json")
}
