//! Local store: the device-side cache of every tracked table.
//!
//! Two interchangeable backends implement [`LocalStore`]: a durable
//! `SQLite` file and an in-process store for devices without a writable
//! data directory.

mod memory;
mod migrations;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreBackend;
use crate::error::{Error, Result};
use crate::models::{NewSyncConflict, Record, RecordId, SyncConflict, SyncFailure, TableName};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Metadata key holding the completion time of the last full sync
pub const LAST_SYNC_KEY: &str = "lastSyncTimestamp";

/// Trait for local record storage
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Backend name for logs and status output
    fn backend_name(&self) -> &'static str;

    /// Non-deleted records of `user_id`, newest first
    async fn get_all(&self, table: TableName, user_id: &str) -> Result<Vec<Record>>;

    /// Non-deleted records of `user_id` in one month
    async fn get_by_month(
        &self,
        table: TableName,
        user_id: &str,
        month_ref: &str,
    ) -> Result<Vec<Record>>;

    /// Any record with this ID, tombstones included
    async fn get_by_id(&self, table: TableName, id: &RecordId) -> Result<Option<Record>>;

    /// Insert or fully replace a record
    async fn put(&self, table: TableName, record: &Record) -> Result<()>;

    /// Turn a record into a tombstone awaiting remote deletion.
    ///
    /// Returns `false` when no record has this ID.
    async fn delete(&self, table: TableName, id: &RecordId) -> Result<bool>;

    /// Physically remove a record and its failure entry
    async fn hard_delete(&self, table: TableName, id: &RecordId) -> Result<()>;

    /// Every record with pending local changes, across users
    async fn get_unsynced(&self, table: TableName) -> Result<Vec<Record>>;

    /// Mark a record as identical to the remote copy
    async fn mark_synced(&self, table: TableName, id: &RecordId) -> Result<()>;

    /// Remove every record of `user_id` from one table
    async fn clear_table(&self, table: TableName, user_id: &str) -> Result<usize>;

    async fn get_meta(&self, key: &str) -> Result<Option<String>>;

    async fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    /// Log a last-writer-wins decision
    async fn record_conflict(&self, conflict: &NewSyncConflict) -> Result<()>;

    /// Logged conflicts, newest first
    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;

    async fn get_failure(&self, table: TableName, id: &RecordId) -> Result<Option<SyncFailure>>;

    async fn put_failure(&self, failure: &SyncFailure) -> Result<()>;

    async fn clear_failure(&self, table: TableName, id: &RecordId) -> Result<()>;

    async fn list_failures(&self) -> Result<Vec<SyncFailure>>;
}

/// Open the configured backend.
///
/// Any initialisation failure is reported as [`Error::StoreUnavailable`].
pub async fn open_local_store(backend: &StoreBackend) -> Result<Arc<dyn LocalStore>> {
    match backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory local store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite(path) => match SqliteStore::open(path).await {
            Ok(store) => {
                tracing::info!("Opened local store at {}", path.display());
                Ok(Arc::new(store))
            }
            Err(error) => {
                tracing::warn!(
                    "Local store at {} unavailable: {error}",
                    path.display()
                );
                Err(Error::StoreUnavailable(error.to_string()))
            }
        },
    }
}
