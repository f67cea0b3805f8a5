//! Data access facade: the single entry point for reading and mutating
//! records.
//!
//! Every mutation lands in the local store first (`synced = false`) and is
//! then sent to the remote when online. Failures never escape as errors;
//! callers get `{ success, message }` outcomes.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::connectivity::ConnectivityMonitor;
use crate::error::Error;
use crate::models::{
    normalize_month_ref, sanitize_fields, Fields, Record, RecordId, TableName, MONTH_FIELD,
};
use crate::remote::{with_timeout, RemoteBackend, RemoteFilter, RemoteResult};
use crate::store::LocalStore;
use crate::sync::{assume_on_remote, merge_remote};
use crate::util::{format_timestamp, timestamp_now};

/// Filter for [`DataAccess::read`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadQuery {
    /// Month reference (`JAN/25`); ignored for tables without a month
    pub month_ref: Option<String>,
}

impl ReadQuery {
    pub const fn all() -> Self {
        Self { month_ref: None }
    }

    pub fn month(month_ref: impl Into<String>) -> Self {
        Self {
            month_ref: Some(month_ref.into()),
        }
    }
}

/// Result of [`DataAccess::write`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    /// The stored record, including its generated id
    pub record: Option<Record>,
    pub message: String,
}

/// Result of [`DataAccess::update`] and [`DataAccess::delete`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
}

impl MutationOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

const SAVED_OFFLINE: &str = "Saved offline; will sync when the connection returns";
const SAVED_PENDING: &str = "Saved locally; will sync on the next attempt";
const NO_STORAGE: &str = "Offline and the local cache is unavailable";

/// Reads and writes records for one user.
pub struct DataAccess {
    user_id: String,
    store: Option<Arc<dyn LocalStore>>,
    remote: Arc<dyn RemoteBackend>,
    connectivity: ConnectivityMonitor,
    call_timeout: Duration,
}

impl DataAccess {
    /// `store` is `None` when the local cache could not be opened; the
    /// facade then works in remote-only mode.
    pub fn new(
        user_id: impl Into<String>,
        store: Option<Arc<dyn LocalStore>>,
        remote: Arc<dyn RemoteBackend>,
        connectivity: ConnectivityMonitor,
        call_timeout: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            remote,
            connectivity,
            call_timeout,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub const fn store_available(&self) -> bool {
        self.store.is_some()
    }

    fn is_online(&self) -> bool {
        self.connectivity.current_state()
    }

    fn pending_message(&self) -> &'static str {
        if self.is_online() {
            SAVED_PENDING
        } else {
            SAVED_OFFLINE
        }
    }

    /// Records of `table`, preferring fresh remote data when online.
    ///
    /// Remote rows are merged into the local cache by last-writer-wins, so a
    /// pending local edit is returned instead of an older remote copy.
    pub async fn read(&self, table: TableName, query: &ReadQuery) -> Vec<Record> {
        let month_ref = query
            .month_ref
            .as_deref()
            .filter(|_| table.has_month())
            .map(normalize_month_ref);

        if self.is_online() {
            match self.fetch_remote(table, month_ref.clone()).await {
                Ok(records) => {
                    let Some(store) = &self.store else {
                        return records;
                    };
                    for record in &records {
                        if let Err(error) = merge_remote(store.as_ref(), table, record).await {
                            tracing::warn!(table = %table, id = %record.id, "Failed to cache remote row: {error}");
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(table = %table, "Remote read failed, serving local cache: {error}");
                }
            }
        }

        self.read_local(table, month_ref.as_deref()).await
    }

    async fn fetch_remote(
        &self,
        table: TableName,
        month_ref: Option<String>,
    ) -> RemoteResult<Vec<Record>> {
        let filter = RemoteFilter::user(self.user_id.clone()).with_month(month_ref);
        let rows = with_timeout(self.call_timeout, self.remote.select(table, &filter)).await?;

        let mut records: Vec<Record> = rows
            .into_iter()
            .filter_map(|row| match Record::from_remote(row) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::warn!(table = %table, "Ignoring malformed remote row: {error}");
                    None
                }
            })
            .filter(|record| record.user_id == self.user_id)
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    async fn read_local(&self, table: TableName, month_ref: Option<&str>) -> Vec<Record> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        let result = match month_ref {
            Some(month_ref) => store.get_by_month(table, &self.user_id, month_ref).await,
            None => store.get_all(table, &self.user_id).await,
        };
        result.unwrap_or_else(|error| {
            tracing::warn!(table = %table, "Local read failed: {error}");
            Vec::new()
        })
    }

    /// Store `put`, reporting failure as `false`
    async fn put_local(&self, table: TableName, record: &Record) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.put(table, record).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(table = %table, id = %record.id, "Local write failed: {error}");
                false
            }
        }
    }

    /// Remember that a write whose answer was lost may have reached the
    /// remote, so deleting the record later is sent there too.
    async fn flag_possibly_remote(&self, table: TableName, id: &RecordId) {
        if let Some(store) = &self.store {
            if let Err(error) = assume_on_remote(store.as_ref(), table, id).await {
                tracing::warn!(table = %table, id = %id, "Failed to flag record as possibly remote: {error}");
            }
        }
    }

    async fn mark_synced_local(&self, table: TableName, id: &RecordId) {
        if let Some(store) = &self.store {
            if let Err(error) = store.mark_synced(table, id).await {
                tracing::warn!(table = %table, id = %id, "Failed to mark record synced: {error}");
            }
        }
    }

    /// Create a record from `data`.
    ///
    /// The record gets a fresh id, the session's user id and equal creation
    /// and update timestamps. Month-bucketed tables get `mes_referencia`
    /// derived from their date field when it is missing.
    pub async fn write(&self, table: TableName, data: Fields) -> WriteOutcome {
        let mut record = Record::new(self.user_id.clone(), data);
        record.fill_month_ref(table);
        let stored_locally = self.put_local(table, &record).await;

        if self.is_online() {
            let payload = record.to_remote_payload();
            match with_timeout(self.call_timeout, self.remote.insert(table, &payload)).await {
                Ok(()) => {
                    if stored_locally {
                        self.mark_synced_local(table, &record.id).await;
                    }
                    record.synced = true;
                    record.on_remote = true;
                    tracing::debug!(table = %table, id = %record.id, "Record created");
                    return WriteOutcome {
                        success: true,
                        record: Some(record),
                        message: "Saved".to_string(),
                    };
                }
                Err(error) => {
                    tracing::warn!(table = %table, id = %record.id, "Remote insert failed, will retry on next sync: {error}");
                    if error.may_have_applied() && stored_locally {
                        self.flag_possibly_remote(table, &record.id).await;
                        record.on_remote = true;
                    }
                }
            }
        }

        if stored_locally {
            WriteOutcome {
                success: true,
                record: Some(record),
                message: self.pending_message().to_string(),
            }
        } else {
            WriteOutcome {
                success: false,
                record: None,
                message: if self.store.is_some() {
                    "Could not save the record".to_string()
                } else {
                    NO_STORAGE.to_string()
                },
            }
        }
    }

    /// Merge `data` into the record with `id`.
    ///
    /// With a local store the record must exist locally; without one the
    /// patch goes straight to the remote.
    pub async fn update(&self, table: TableName, id: &RecordId, data: Fields) -> MutationOutcome {
        let patch = sanitize_fields(data);
        let local = self.live_local(table, id).await;
        if local.is_none() && self.store.is_some() {
            return MutationOutcome::failed(Error::NotFound(id.to_string()).to_string());
        }

        let updated = local.map(|mut record| {
            record.apply_patch(patch.clone());
            record.fill_month_ref(table);
            record
        });
        let stored_locally = match &updated {
            Some(record) => self.put_local(table, record).await,
            None => false,
        };

        if self.is_online() {
            let result = match &updated {
                Some(record) if !record.on_remote => {
                    let payload = record.to_remote_payload();
                    let result =
                        with_timeout(self.call_timeout, self.remote.upsert(table, &payload)).await;
                    if result.as_ref().is_err_and(|error| error.may_have_applied()) && stored_locally {
                        self.flag_possibly_remote(table, id).await;
                    }
                    result
                }
                Some(record) => {
                    let remote_patch = remote_patch(&patch, record);
                    with_timeout(self.call_timeout, self.remote.update(table, id, &remote_patch))
                        .await
                }
                None => {
                    let mut remote_patch = patch.clone();
                    remote_patch.insert(
                        "updated_at".into(),
                        Value::String(format_timestamp(&timestamp_now())),
                    );
                    with_timeout(self.call_timeout, self.remote.update(table, id, &remote_patch))
                        .await
                }
            };
            match result {
                Ok(()) => {
                    if stored_locally {
                        self.mark_synced_local(table, id).await;
                    }
                    return MutationOutcome::ok("Updated");
                }
                Err(error) => {
                    tracing::warn!(table = %table, id = %id, "Remote update failed, will retry on next sync: {error}");
                }
            }
        }

        if stored_locally {
            MutationOutcome::ok(self.pending_message())
        } else if self.store.is_none() {
            MutationOutcome::failed(NO_STORAGE)
        } else {
            MutationOutcome::failed("Could not save the update")
        }
    }

    /// Delete the record with `id`.
    ///
    /// A record the remote never saw is removed locally without any remote
    /// call; otherwise a tombstone is kept until the remote confirms.
    pub async fn delete(&self, table: TableName, id: &RecordId) -> MutationOutcome {
        let local = self.any_local(table, id).await;

        if let (Some(store), Some(record)) = (&self.store, &local) {
            if record.is_local_only() {
                return match store.hard_delete(table, id).await {
                    Ok(()) => {
                        tracing::debug!(table = %table, id = %id, "Removed record that never reached the remote");
                        MutationOutcome::ok("Deleted")
                    }
                    Err(error) => {
                        tracing::warn!(table = %table, id = %id, "Local delete failed: {error}");
                        MutationOutcome::failed("Could not delete the record")
                    }
                };
            }
        }

        let tombstoned = match (&self.store, &local) {
            (Some(store), Some(_)) => store.delete(table, id).await.unwrap_or_else(|error| {
                tracing::warn!(table = %table, id = %id, "Local delete failed: {error}");
                false
            }),
            _ => false,
        };

        if self.is_online() {
            match with_timeout(self.call_timeout, self.remote.delete(table, id)).await {
                Ok(()) => {
                    if let Some(store) = &self.store {
                        if let Err(error) = store.hard_delete(table, id).await {
                            tracing::warn!(table = %table, id = %id, "Failed to purge tombstone: {error}");
                        }
                    }
                    return MutationOutcome::ok("Deleted");
                }
                Err(error) => {
                    tracing::warn!(table = %table, id = %id, "Remote delete failed, will retry on next sync: {error}");
                }
            }
        }

        if tombstoned {
            MutationOutcome::ok(self.pending_message())
        } else if local.is_none() && self.store.is_some() {
            MutationOutcome::failed(Error::NotFound(id.to_string()).to_string())
        } else if self.store.is_none() {
            MutationOutcome::failed(NO_STORAGE)
        } else {
            MutationOutcome::failed("Could not delete the record")
        }
    }

    /// Local copy including tombstones
    async fn any_local(&self, table: TableName, id: &RecordId) -> Option<Record> {
        let store = self.store.as_ref()?;
        store.get_by_id(table, id).await.unwrap_or_else(|error| {
            tracing::warn!(table = %table, id = %id, "Local lookup failed: {error}");
            None
        })
    }

    /// Local copy unless it is a tombstone
    async fn live_local(&self, table: TableName, id: &RecordId) -> Option<Record> {
        self.any_local(table, id)
            .await
            .filter(|record| !record.deleted)
    }
}

/// Partial update sent to the remote: the caller's fields plus the new
/// `updated_at` and any normalized month reference.
fn remote_patch(patch: &Fields, record: &Record) -> Fields {
    let mut remote_patch = patch.clone();
    remote_patch.insert(
        "updated_at".into(),
        Value::String(format_timestamp(&record.updated_at)),
    );
    if let Some(month_ref) = record.month_ref() {
        remote_patch.insert(MONTH_FIELD.into(), Value::String(month_ref.to_string()));
    }
    remote_patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteOp};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const USER: &str = "user-1";

    struct Harness {
        store: Arc<MemoryStore>,
        remote: Arc<MemoryRemote>,
        monitor: ConnectivityMonitor,
        data: DataAccess,
    }

    fn harness(online: bool, with_store: bool) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemote::new());
        remote.set_reachable(online);
        let monitor = ConnectivityMonitor::new(online);
        let local: Option<Arc<dyn LocalStore>> = if with_store {
            Some(store.clone())
        } else {
            None
        };
        let data = DataAccess::new(
            USER,
            local,
            remote.clone(),
            monitor.clone(),
            Duration::from_secs(5),
        );
        Harness {
            store,
            remote,
            monitor,
            data,
        }
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn rent() -> Fields {
        fields(json!({"descricao": "Aluguel", "valor": 2500, "data_pagamento": "2025-01-10"}))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_write_reaches_both_stores() {
        let h = harness(true, true);
        let outcome = h.data.write(TableName::Expenses, rent()).await;
        assert!(outcome.success);
        let record = outcome.record.unwrap();
        assert!(record.synced);

        let stored = h
            .store
            .get_by_id(TableName::Expenses, &record.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.synced);
        assert_eq!(stored.month_ref(), Some("JAN/25"));
        let row = h.remote.row(TableName::Expenses, &record.id).unwrap();
        assert_eq!(row["user_id"], json!(USER));
        assert_eq!(row["mes_referencia"], json!("JAN/25"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_write_is_kept_pending() {
        let h = harness(false, true);
        let outcome = h.data.write(TableName::Expenses, rent()).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, SAVED_OFFLINE);
        let record = outcome.record.unwrap();
        assert!(!record.synced);
        assert!(h.remote.calls().is_empty());

        let pending = h.store.get_unsynced(TableName::Expenses).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, record.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_remote_insert_still_succeeds_locally() {
        let h = harness(true, true);
        h.remote.set_reachable(false);
        let outcome = h.data.write(TableName::Categories, fields(json!({"nome": "Lazer"}))).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, SAVED_PENDING);
        assert_eq!(h.store.get_unsynced(TableName::Categories).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_online_merges_remote_rows_into_cache() {
        let h = harness(true, true);
        h.remote.seed(
            TableName::Income,
            json!({
                "id": "remote-1",
                "user_id": USER,
                "created_at": "2025-01-05T10:00:00Z",
                "updated_at": "2025-01-05T10:00:00Z",
                "descricao": "Salario",
                "mes_referencia": "JAN/25"
            }),
        );

        let records = h.data.read(TableName::Income, &ReadQuery::month("jan/25")).await;
        assert_eq!(records.len(), 1);
        assert!(h
            .store
            .get_by_id(TableName::Income, &RecordId::from("remote-1"))
            .await
            .unwrap()
            .is_some());

        h.monitor.set_online(false);
        let cached = h.data.read(TableName::Income, &ReadQuery::all()).await;
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_online_keeps_newer_pending_edit() {
        let h = harness(true, true);
        let created = h
            .data
            .write(TableName::Categories, fields(json!({"nome": "Mercado"})))
            .await
            .record
            .unwrap();

        h.remote.set_reachable(false);
        let outcome = h
            .data
            .update(TableName::Categories, &created.id, fields(json!({"nome": "Supermercado"})))
            .await;
        assert!(outcome.success);

        h.remote.set_reachable(true);
        let records = h.data.read(TableName::Categories, &ReadQuery::all()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("nome"), Some("Supermercado"));
        assert!(!records[0].synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_falls_back_to_cache_when_remote_fails() {
        let h = harness(true, true);
        h.data.write(TableName::Debts, fields(json!({"descricao": "Cartao"}))).await;
        h.remote.set_reachable(false);
        let records = h.data.read(TableName::Debts, &ReadQuery::all()).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn month_filter_is_ignored_for_tables_without_month() {
        let h = harness(false, true);
        h.data
            .write(TableName::BankBalances, fields(json!({"banco": "Nubank", "saldo": 10})))
            .await;
        let records = h
            .data
            .read(TableName::BankBalances, &ReadQuery::month("JAN/25"))
            .await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_pushed_record_sends_partial_patch() {
        let h = harness(true, true);
        let created = h.data.write(TableName::Expenses, rent()).await.record.unwrap();

        let outcome = h
            .data
            .update(TableName::Expenses, &created.id, fields(json!({"valor": 2600})))
            .await;
        assert!(outcome.success);

        let ops: Vec<RemoteOp> = h
            .remote
            .calls_for(&created.id)
            .into_iter()
            .map(|call| call.op)
            .collect();
        assert_eq!(ops, vec![RemoteOp::Insert, RemoteOp::Update]);
        let row = h.remote.row(TableName::Expenses, &created.id).unwrap();
        assert_eq!(row["valor"], json!(2600));
        assert_eq!(row["descricao"], json!("Aluguel"));

        let stored = h
            .store
            .get_by_id(TableName::Expenses, &created.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.synced);
        assert!(stored.updated_at > created.updated_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_local_only_record_upserts() {
        let h = harness(false, true);
        let created = h.data.write(TableName::Expenses, rent()).await.record.unwrap();

        h.monitor.set_online(true);
        h.remote.set_reachable(true);
        let outcome = h
            .data
            .update(TableName::Expenses, &created.id, fields(json!({"valor": 2600})))
            .await;
        assert!(outcome.success);
        let calls = h.remote.calls_for(&created.id);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].op, RemoteOp::Upsert);
        assert!(h.remote.row(TableName::Expenses, &created.id).is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_unknown_record_offline_fails() {
        let h = harness(false, true);
        let outcome = h
            .data
            .update(TableName::Income, &RecordId::from("missing"), fields(json!({"valor": 1})))
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_of_unknown_record_online_fails_without_remote_call() {
        let h = harness(true, true);
        let missing = RecordId::new();
        let outcome = h
            .data
            .update(TableName::Income, &missing, fields(json!({"valor": 1})))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, format!("Record not found: {missing}"));
        assert!(h.remote.calls_for(&missing).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lost_insert_response_makes_later_delete_reach_remote() {
        let h = harness(true, true);
        h.remote.set_lose_responses(true);
        let outcome = h.data.write(TableName::Expenses, rent()).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, SAVED_PENDING);
        let record = outcome.record.unwrap();
        assert!(record.on_remote);
        assert!(h.remote.row(TableName::Expenses, &record.id).is_some());

        h.remote.set_lose_responses(false);
        let outcome = h.data.delete(TableName::Expenses, &record.id).await;
        assert!(outcome.success);
        assert!(h.remote.row(TableName::Expenses, &record.id).is_none());
        assert!(h
            .store
            .get_by_id(TableName::Expenses, &record.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lost_upsert_response_keeps_tombstone_for_sync() {
        let h = harness(false, true);
        let created = h.data.write(TableName::Debts, fields(json!({"descricao": "Cartao"}))).await.record.unwrap();

        h.monitor.set_online(true);
        h.remote.set_reachable(true);
        h.remote.set_lose_responses(true);
        let outcome = h
            .data
            .update(TableName::Debts, &created.id, fields(json!({"descricao": "Cartao Visa"})))
            .await;
        assert!(outcome.success);

        h.monitor.set_online(false);
        h.data.delete(TableName::Debts, &created.id).await;
        let tombstone = h
            .store
            .get_by_id(TableName::Debts, &created.id)
            .await
            .unwrap()
            .unwrap();
        assert!(tombstone.deleted);
        assert!(tombstone.on_remote);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_of_local_only_record_never_calls_remote() {
        let h = harness(false, true);
        let created = h.data.write(TableName::Expenses, rent()).await.record.unwrap();

        h.monitor.set_online(true);
        h.remote.set_reachable(true);
        let outcome = h.data.delete(TableName::Expenses, &created.id).await;
        assert!(outcome.success);
        assert!(h.remote.calls_for(&created.id).is_empty());
        assert!(h
            .store
            .get_by_id(TableName::Expenses, &created.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_delete_of_pushed_record_leaves_tombstone() {
        let h = harness(true, true);
        let created = h.data.write(TableName::Debts, fields(json!({"descricao": "Cartao"}))).await.record.unwrap();

        h.monitor.set_online(false);
        h.remote.set_reachable(false);
        let outcome = h.data.delete(TableName::Debts, &created.id).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, SAVED_OFFLINE);

        let tombstone = h
            .store
            .get_by_id(TableName::Debts, &created.id)
            .await
            .unwrap()
            .unwrap();
        assert!(tombstone.deleted);
        assert!(!tombstone.synced);
        assert!(h.data.read(TableName::Debts, &ReadQuery::all()).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_delete_removes_everywhere() {
        let h = harness(true, true);
        let created = h.data.write(TableName::Debts, fields(json!({"descricao": "Cartao"}))).await.record.unwrap();

        let outcome = h.data.delete(TableName::Debts, &created.id).await;
        assert!(outcome.success);
        assert!(h.remote.row(TableName::Debts, &created.id).is_none());
        assert!(h
            .store
            .get_by_id(TableName::Debts, &created.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_only_mode_without_store() {
        let h = harness(true, false);
        assert!(!h.data.store_available());
        let outcome = h.data.write(TableName::Categories, fields(json!({"nome": "Lazer"}))).await;
        assert!(outcome.success);

        let records = h.data.read(TableName::Categories, &ReadQuery::all()).await;
        assert_eq!(records.len(), 1);

        h.monitor.set_online(false);
        h.remote.set_reachable(false);
        assert!(h.data.read(TableName::Categories, &ReadQuery::all()).await.is_empty());
        let offline = h.data.write(TableName::Categories, fields(json!({"nome": "Viagem"}))).await;
        assert!(!offline.success);
        assert_eq!(offline.message, NO_STORAGE);
    }
}
