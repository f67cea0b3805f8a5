//! `SQLite` implementation of `LocalStore`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::{migrations, LocalStore};
use crate::error::{Error, Result};
use crate::models::{
    normalize_month_ref, Fields, NewSyncConflict, Record, RecordId, SyncConflict, SyncFailure,
    TableName,
};
use crate::util::{format_timestamp, parse_timestamp, timestamp_now};

const RECORD_COLUMNS: &str =
    "id, user_id, created_at, updated_at, synced, deleted, on_remote, data";

const FAILURE_COLUMNS: &str =
    "table_name, record_id, attempts, last_error, last_attempt_at, next_attempt_at";

/// Durable local store backed by a single `SQLite` file.
///
/// Booleans are stored as 0/1 and domain fields as a JSON text column.
/// Every statement runs on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the store at `path`, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. A file that is not a database is moved
    /// aside and replaced by a fresh one.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || open_or_recover(&path))
            .await
            .map_err(|error| Error::Database(format!("Failed to open local store: {error}")))??;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure(&conn)?;
        migrations::run(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `work` on the blocking pool with exclusive use of the connection.
    async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            work(&mut conn)
        })
        .await
        .map_err(|error| Error::Database(format!("Local store task failed: {error}")))?
    }
}

fn open_or_recover(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match open_connection(path) {
        Ok(conn) => Ok(conn),
        Err(error) if is_corrupted_db_error(&error) && path.is_file() => {
            tracing::warn!(
                "Local store at {} is corrupted: {error}. Starting from an empty cache.",
                path.display()
            );
            quarantine_corrupted_db_file(path)?;
            open_connection(path)
        }
        Err(error) => Err(error),
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&mut conn)?;
    Ok(conn)
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map(params, parse_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Configure `SQLite` for a single-writer local cache
fn configure(conn: &Connection) -> Result<()> {
    // In-memory databases answer "memory" here.
    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
        .ok();
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

fn is_corrupted_db_error(error: &Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("file is not a database") || message.contains("malformed")
}

fn quarantine_corrupted_db_file(path: &Path) -> Result<()> {
    let timestamp = Utc::now().timestamp_millis();
    let file_name = path
        .file_name()
        .map_or_else(|| "finanza.db".into(), |name| name.to_string_lossy());
    let backup_path = path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));
    std::fs::rename(path, &backup_path)?;
    tracing::warn!(
        "Moved corrupted local store from {} to {}",
        path.display(),
        backup_path.display()
    );
    Ok(())
}

fn conversion_error(
    index: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
}

fn parse_time(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    parse_timestamp(&raw).ok_or_else(|| {
        conversion_error(
            index,
            Error::InvalidInput(format!("invalid timestamp: {raw}")),
        )
    })
}

/// Parse a record from a database row
fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let id: String = row.get(0)?;
    let fields = match row.get::<_, Value>(7)? {
        Value::Object(map) => map,
        _ => Fields::new(),
    };
    Ok(Record {
        id: RecordId::from(id),
        user_id: row.get(1)?,
        created_at: parse_time(row, 2)?,
        updated_at: parse_time(row, 3)?,
        synced: row.get::<_, i32>(4)? != 0,
        deleted: row.get::<_, i32>(5)? != 0,
        on_remote: row.get::<_, i32>(6)? != 0,
        fields,
    })
}

fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConflict> {
    let table: String = row.get(1)?;
    let record_id: String = row.get(2)?;
    let winner: String = row.get(5)?;
    Ok(SyncConflict {
        id: row.get(0)?,
        table: table.parse().map_err(|error| conversion_error(1, error))?,
        record_id: RecordId::from(record_id),
        local_updated_at: parse_time(row, 3)?,
        remote_updated_at: parse_time(row, 4)?,
        winner: winner.parse().map_err(|error| conversion_error(5, error))?,
        resolved_at: parse_time(row, 6)?,
    })
}

fn parse_failure(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncFailure> {
    let table: String = row.get(0)?;
    let record_id: String = row.get(1)?;
    Ok(SyncFailure {
        table: table.parse().map_err(|error| conversion_error(0, error))?,
        record_id: RecordId::from(record_id),
        attempts: u32::try_from(row.get::<_, i64>(2)?).unwrap_or(u32::MAX),
        last_error: row.get(3)?,
        last_attempt_at: parse_time(row, 4)?,
        next_attempt_at: parse_time(row, 5)?,
    })
}

#[async_trait]
impl LocalStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_all(&self, table: TableName, user_id: &str) -> Result<Vec<Record>> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            query_records(
                conn,
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM {table}
                     WHERE user_id = ?1 AND deleted = 0
                     ORDER BY created_at DESC, id DESC"
                ),
                params![user_id],
            )
        })
        .await
    }

    async fn get_by_month(
        &self,
        table: TableName,
        user_id: &str,
        month_ref: &str,
    ) -> Result<Vec<Record>> {
        if !table.has_month() {
            return Err(Error::InvalidInput(format!(
                "{table} has no month reference"
            )));
        }
        let user_id = user_id.to_string();
        let month_ref = normalize_month_ref(month_ref);
        self.run(move |conn| {
            query_records(
                conn,
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM {table}
                     WHERE user_id = ?1 AND mes_referencia = ?2 AND deleted = 0
                     ORDER BY created_at DESC, id DESC"
                ),
                params![user_id, month_ref],
            )
        })
        .await
    }

    async fn get_by_id(&self, table: TableName, id: &RecordId) -> Result<Option<Record>> {
        let id = id.clone();
        self.run(move |conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {RECORD_COLUMNS} FROM {table} WHERE id = ?1"),
                    params![id.as_str()],
                    parse_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn put(&self, table: TableName, record: &Record) -> Result<()> {
        let data = serde_json::to_string(&record.fields)?;
        let month_ref = record.month_ref().map(normalize_month_ref);
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {table}
                     (id, user_id, mes_referencia, created_at, updated_at, synced, deleted, on_remote, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    record.id.as_str(),
                    record.user_id,
                    month_ref,
                    format_timestamp(&record.created_at),
                    format_timestamp(&record.updated_at),
                    i32::from(record.synced),
                    i32::from(record.deleted),
                    i32::from(record.on_remote),
                    data
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, table: TableName, id: &RecordId) -> Result<bool> {
        let id = id.clone();
        self.run(move |conn| {
            let rows = conn.execute(
                &format!("UPDATE {table} SET deleted = 1, synced = 0 WHERE id = ?1"),
                params![id.as_str()],
            )?;
            if rows == 0 {
                tracing::warn!(table = %table, id = %id, "Delete requested for unknown record");
            }
            Ok(rows > 0)
        })
        .await
    }

    async fn hard_delete(&self, table: TableName, id: &RecordId) -> Result<()> {
        let id = id.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                &format!("DELETE FROM {table} WHERE id = ?1"),
                params![id.as_str()],
            )?;
            tx.execute(
                "DELETE FROM sync_failures WHERE table_name = ?1 AND record_id = ?2",
                params![table.as_str(), id.as_str()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_unsynced(&self, table: TableName) -> Result<Vec<Record>> {
        self.run(move |conn| {
            query_records(
                conn,
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM {table}
                     WHERE synced = 0
                     ORDER BY updated_at ASC, id ASC"
                ),
                [],
            )
        })
        .await
    }

    async fn mark_synced(&self, table: TableName, id: &RecordId) -> Result<()> {
        let id = id.clone();
        self.run(move |conn| {
            conn.execute(
                &format!("UPDATE {table} SET synced = 1, on_remote = 1 WHERE id = ?1"),
                params![id.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear_table(&self, table: TableName, user_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            let removed = conn.execute(
                &format!("DELETE FROM {table} WHERE user_id = ?1"),
                params![user_id],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.run(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM sync_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn record_conflict(&self, conflict: &NewSyncConflict) -> Result<()> {
        let conflict = conflict.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sync_conflicts
                 (table_name, record_id, local_updated_at, remote_updated_at, winner, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conflict.table.as_str(),
                    conflict.record_id.as_str(),
                    format_timestamp(&conflict.local_updated_at),
                    format_timestamp(&conflict.remote_updated_at),
                    conflict.winner.as_str(),
                    format_timestamp(&timestamp_now()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, table_name, record_id, local_updated_at, remote_updated_at, winner, resolved_at
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?1",
            )?;
            let conflicts = stmt
                .query_map(params![limit], parse_conflict)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(conflicts)
        })
        .await
    }

    async fn get_failure(&self, table: TableName, id: &RecordId) -> Result<Option<SyncFailure>> {
        let id = id.clone();
        self.run(move |conn| {
            let failure = conn
                .query_row(
                    &format!(
                        "SELECT {FAILURE_COLUMNS} FROM sync_failures
                         WHERE table_name = ?1 AND record_id = ?2"
                    ),
                    params![table.as_str(), id.as_str()],
                    parse_failure,
                )
                .optional()?;
            Ok(failure)
        })
        .await
    }

    async fn put_failure(&self, failure: &SyncFailure) -> Result<()> {
        let failure = failure.clone();
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO sync_failures ({FAILURE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    failure.table.as_str(),
                    failure.record_id.as_str(),
                    i64::from(failure.attempts),
                    failure.last_error,
                    format_timestamp(&failure.last_attempt_at),
                    format_timestamp(&failure.next_attempt_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear_failure(&self, table: TableName, id: &RecordId) -> Result<()> {
        let id = id.clone();
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM sync_failures WHERE table_name = ?1 AND record_id = ?2",
                params![table.as_str(), id.as_str()],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_failures(&self) -> Result<Vec<SyncFailure>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FAILURE_COLUMNS} FROM sync_failures ORDER BY table_name, record_id"
            ))?;
            let failures = stmt
                .query_map([], parse_failure)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(failures)
        })
        .await
    }
}
