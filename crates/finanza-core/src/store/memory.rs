//! In-process implementation of `LocalStore`

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::LocalStore;
use crate::error::{Error, Result};
use crate::models::{
    normalize_month_ref, NewSyncConflict, Record, RecordId, SyncConflict, SyncFailure, TableName,
};
use crate::util::timestamp_now;

type UserKey = (TableName, String);
type MonthKey = (TableName, String, String);

#[derive(Debug, Default)]
struct MemoryTables {
    records: HashMap<TableName, HashMap<String, Record>>,
    by_user: HashMap<UserKey, BTreeSet<String>>,
    by_month: HashMap<MonthKey, BTreeSet<String>>,
    meta: HashMap<String, String>,
    conflicts: Vec<SyncConflict>,
    failures: BTreeMap<(TableName, String), SyncFailure>,
}

impl MemoryTables {
    fn month_key(table: TableName, record: &Record) -> Option<MonthKey> {
        if !table.has_month() {
            return None;
        }
        record
            .month_ref()
            .map(|month_ref| (table, record.user_id.clone(), normalize_month_ref(month_ref)))
    }

    fn index(&mut self, table: TableName, record: &Record) {
        let id = record.id.to_string();
        self.by_user
            .entry((table, record.user_id.clone()))
            .or_default()
            .insert(id.clone());
        if let Some(key) = Self::month_key(table, record) {
            self.by_month.entry(key).or_default().insert(id);
        }
    }

    /// Drop `record` from both indexes, removing sets left empty.
    fn unindex(&mut self, table: TableName, record: &Record) {
        let id = record.id.as_str();
        let user_key = (table, record.user_id.clone());
        if let Some(ids) = self.by_user.get_mut(&user_key) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_user.remove(&user_key);
            }
        }
        if let Some(key) = Self::month_key(table, record) {
            if let Some(ids) = self.by_month.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_month.remove(&key);
                }
            }
        }
    }

    fn insert(&mut self, table: TableName, record: Record) {
        self.remove(table, record.id.as_str());
        self.index(table, &record);
        self.records
            .entry(table)
            .or_default()
            .insert(record.id.to_string(), record);
    }

    fn remove(&mut self, table: TableName, id: &str) -> Option<Record> {
        let removed = self.records.get_mut(&table)?.remove(id)?;
        self.unindex(table, &removed);
        Some(removed)
    }

    fn get(&self, table: TableName, id: &str) -> Option<&Record> {
        self.records.get(&table)?.get(id)
    }

    fn get_mut(&mut self, table: TableName, id: &str) -> Option<&mut Record> {
        self.records.get_mut(&table)?.get_mut(id)
    }

    /// Live records behind a set of indexed IDs, newest first
    fn collect<'a>(&self, table: TableName, ids: impl IntoIterator<Item = &'a String>) -> Vec<Record> {
        let mut records: Vec<Record> = ids
            .into_iter()
            .filter_map(|id| self.get(table, id))
            .filter(|record| !record.deleted)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records
    }
}

/// Local store kept entirely in memory.
///
/// Used when the device has no durable location and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_all(&self, table: TableName, user_id: &str) -> Result<Vec<Record>> {
        let tables = self.tables.read();
        let records = tables
            .by_user
            .get(&(table, user_id.to_string()))
            .map(|ids| tables.collect(table, ids))
            .unwrap_or_default();
        Ok(records)
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
        let key = (table, user_id.to_string(), normalize_month_ref(month_ref));
        let tables = self.tables.read();
        let records = tables
            .by_month
            .get(&key)
            .map(|ids| tables.collect(table, ids))
            .unwrap_or_default();
        Ok(records)
    }

    async fn get_by_id(&self, table: TableName, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.tables.read().get(table, id.as_str()).cloned())
    }

    async fn put(&self, table: TableName, record: &Record) -> Result<()> {
        self.tables.write().insert(table, record.clone());
        Ok(())
    }

    async fn delete(&self, table: TableName, id: &RecordId) -> Result<bool> {
        let mut tables = self.tables.write();
        let Some(record) = tables.get_mut(table, id.as_str()) else {
            tracing::warn!(table = %table, id = %id, "Delete requested for unknown record");
            return Ok(false);
        };
        record.deleted = true;
        record.synced = false;
        Ok(true)
    }

    async fn hard_delete(&self, table: TableName, id: &RecordId) -> Result<()> {
        let mut tables = self.tables.write();
        tables.remove(table, id.as_str());
        tables.failures.remove(&(table, id.to_string()));
        Ok(())
    }

    async fn get_unsynced(&self, table: TableName) -> Result<Vec<Record>> {
        let tables = self.tables.read();
        let mut records: Vec<Record> = tables
            .records
            .get(&table)
            .map(|records| {
                records
                    .values()
                    .filter(|record| !record.synced)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn mark_synced(&self, table: TableName, id: &RecordId) -> Result<()> {
        if let Some(record) = self.tables.write().get_mut(table, id.as_str()) {
            record.synced = true;
            record.on_remote = true;
        }
        Ok(())
    }

    async fn clear_table(&self, table: TableName, user_id: &str) -> Result<usize> {
        let mut tables = self.tables.write();
        let ids: Vec<String> = tables
            .by_user
            .get(&(table, user_id.to_string()))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        let removed = ids
            .iter()
            .filter(|id| tables.remove(table, id).is_some())
            .count();
        Ok(removed)
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.tables.read().meta.get(key).cloned())
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.tables
            .write()
            .meta
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn record_conflict(&self, conflict: &NewSyncConflict) -> Result<()> {
        let mut tables = self.tables.write();
        let id = i64::try_from(tables.conflicts.len()).unwrap_or(i64::MAX) + 1;
        tables.conflicts.push(SyncConflict {
            id,
            table: conflict.table,
            record_id: conflict.record_id.clone(),
            local_updated_at: conflict.local_updated_at,
            remote_updated_at: conflict.remote_updated_at,
            winner: conflict.winner,
            resolved_at: timestamp_now(),
        });
        Ok(())
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        Ok(self
            .tables
            .read()
            .conflicts
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_failure(&self, table: TableName, id: &RecordId) -> Result<Option<SyncFailure>> {
        Ok(self
            .tables
            .read()
            .failures
            .get(&(table, id.to_string()))
            .cloned())
    }

    async fn put_failure(&self, failure: &SyncFailure) -> Result<()> {
        self.tables.write().failures.insert(
            (failure.table, failure.record_id.to_string()),
            failure.clone(),
        );
        Ok(())
    }

    async fn clear_failure(&self, table: TableName, id: &RecordId) -> Result<()> {
        self.tables
            .write()
            .failures
            .remove(&(table, id.to_string()));
        Ok(())
    }

    async fn list_failures(&self) -> Result<Vec<SyncFailure>> {
        Ok(self.tables.read().failures.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn income(user_id: &str, month_ref: &str) -> Record {
        let fields = json!({"descricao": "Salario", "valor": 5000, "mes_referencia": month_ref});
        Record::new(user_id, fields.as_object().cloned().unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn month_index_follows_updates() {
        let store = MemoryStore::new();
        let mut record = income("u1", "JAN/25");
        store.put(TableName::Income, &record).await.unwrap();
        assert_eq!(
            store
                .get_by_month(TableName::Income, "u1", "JAN/25")
                .await
                .unwrap()
                .len(),
            1
        );

        record
            .fields
            .insert("mes_referencia".into(), json!("FEV/25"));
        store.put(TableName::Income, &record).await.unwrap();
        assert!(store
            .get_by_month(TableName::Income, "u1", "JAN/25")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .get_by_month(TableName::Income, "u1", "fev/25")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tombstones_are_hidden_but_retrievable() {
        let store = MemoryStore::new();
        let record = income("u1", "JAN/25");
        store.put(TableName::Income, &record).await.unwrap();
        store.mark_synced(TableName::Income, &record.id).await.unwrap();
        assert!(store.delete(TableName::Income, &record.id).await.unwrap());

        assert!(store.get_all(TableName::Income, "u1").await.unwrap().is_empty());
        let unsynced = store.get_unsynced(TableName::Income).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert!(unsynced[0].deleted);

        store.hard_delete(TableName::Income, &record.id).await.unwrap();
        assert!(store
            .get_by_id(TableName::Income, &record.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_all_is_newest_first() {
        let store = MemoryStore::new();
        let mut older = income("u1", "JAN/25");
        older.created_at -= chrono::Duration::days(1);
        let newer = income("u1", "JAN/25");
        store.put(TableName::Income, &older).await.unwrap();
        store.put(TableName::Income, &newer).await.unwrap();

        let records = store.get_all(TableName::Income, "u1").await.unwrap();
        assert_eq!(records[0].id, newer.id);
        assert_eq!(records[1].id, older.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_table_removes_indexes() {
        let store = MemoryStore::new();
        store.put(TableName::Debts, &income("u1", "JAN/25")).await.unwrap();
        store.put(TableName::Debts, &income("u1", "JAN/25")).await.unwrap();

        assert_eq!(store.clear_table(TableName::Debts, "u1").await.unwrap(), 2);
        assert!(store
            .get_by_month(TableName::Debts, "u1", "JAN/25")
            .await
            .unwrap()
            .is_empty());
        assert!(store.get_unsynced(TableName::Debts).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn emptied_index_entries_are_dropped() {
        let store = MemoryStore::new();
        let mut record = income("u1", "JAN/25");
        store.put(TableName::Income, &record).await.unwrap();
        record
            .fields
            .insert("mes_referencia".into(), json!("FEV/25"));
        store.put(TableName::Income, &record).await.unwrap();
        {
            let tables = store.tables.read();
            assert_eq!(tables.by_month.len(), 1);
            assert_eq!(tables.by_user.len(), 1);
        }

        store.hard_delete(TableName::Income, &record.id).await.unwrap();
        let tables = store.tables.read();
        assert!(tables.by_user.is_empty());
        assert!(tables.by_month.is_empty());
    }
}
