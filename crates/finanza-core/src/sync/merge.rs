//! Last-writer-wins merge of remote copies into the local store.

use crate::error::Result;
use crate::models::{ConflictWinner, NewSyncConflict, Record, TableName};
use crate::store::LocalStore;

/// What happened to an incoming remote copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local copy existed
    Inserted,
    /// The remote copy was strictly newer and replaced the local one
    Replaced,
    /// The local copy is as new or newer and was kept
    KeptLocal,
}

impl MergeOutcome {
    pub const fn applied(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced)
    }
}

/// Merge one remote copy, never overwriting a newer local change.
///
/// `incoming` must come from [`Record::from_remote`].
pub async fn merge_remote(
    store: &dyn LocalStore,
    table: TableName,
    incoming: &Record,
) -> Result<MergeOutcome> {
    let Some(mut local) = store.get_by_id(table, &incoming.id).await? else {
        store.put(table, incoming).await?;
        return Ok(MergeOutcome::Inserted);
    };

    if incoming.updated_at > local.updated_at {
        if !local.synced {
            log_conflict(store, table, &local, incoming, ConflictWinner::Remote).await?;
            store.clear_failure(table, &incoming.id).await?;
        }
        store.put(table, incoming).await?;
        return Ok(MergeOutcome::Replaced);
    }

    if !local.synced && local.updated_at > incoming.updated_at {
        log_conflict(store, table, &local, incoming, ConflictWinner::Local).await?;
    }
    if !local.on_remote {
        local.on_remote = true;
        store.put(table, &local).await?;
    }
    Ok(MergeOutcome::KeptLocal)
}

async fn log_conflict(
    store: &dyn LocalStore,
    table: TableName,
    local: &Record,
    incoming: &Record,
    winner: ConflictWinner,
) -> Result<()> {
    tracing::debug!(
        table = %table,
        id = %local.id,
        winner = %winner,
        "Resolved sync conflict by last-writer-wins"
    );
    store
        .record_conflict(&NewSyncConflict {
            table,
            record_id: local.id.clone(),
            local_updated_at: local.updated_at,
            remote_updated_at: incoming.updated_at,
            winner,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use serde_json::json;

    fn category(name: &str) -> Record {
        let fields = json!({"nome": name, "tipo": "despesa"});
        Record::new("u1", fields.as_object().cloned().unwrap())
    }

    fn remote_copy(record: &Record, name: &str, offset: Duration) -> Record {
        let mut copy = record.clone();
        copy.fields.insert("nome".into(), json!(name));
        copy.updated_at = record.updated_at + offset;
        copy.synced = true;
        copy.on_remote = true;
        copy
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inserts_unknown_records() {
        let store = MemoryStore::new();
        let incoming = remote_copy(&category("Lazer"), "Lazer", Duration::zero());
        let outcome = merge_remote(&store, TableName::Categories, &incoming)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Inserted);
        assert!(store
            .get_by_id(TableName::Categories, &incoming.id)
            .await
            .unwrap()
            .unwrap()
            .synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_remote_replaces_pending_change_and_logs_conflict() {
        let store = MemoryStore::new();
        let local = category("Local");
        store.put(TableName::Categories, &local).await.unwrap();

        let incoming = remote_copy(&local, "Remote", Duration::seconds(5));
        let outcome = merge_remote(&store, TableName::Categories, &incoming)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Replaced);

        let stored = store
            .get_by_id(TableName::Categories, &local.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_str("nome"), Some("Remote"));
        let conflicts = store.list_conflicts(10).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].winner, ConflictWinner::Remote);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn older_remote_never_overwrites_local() {
        let store = MemoryStore::new();
        let local = category("Local");
        store.put(TableName::Categories, &local).await.unwrap();

        let incoming = remote_copy(&local, "Stale", -Duration::seconds(5));
        let outcome = merge_remote(&store, TableName::Categories, &incoming)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::KeptLocal);

        let stored = store
            .get_by_id(TableName::Categories, &local.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_str("nome"), Some("Local"));
        assert!(!stored.synced);
        assert!(stored.on_remote);
        assert_eq!(
            store.list_conflicts(10).await.unwrap()[0].winner,
            ConflictWinner::Local
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn equal_timestamps_keep_local_without_conflict() {
        let store = MemoryStore::new();
        let mut local = category("Same");
        local.synced = true;
        local.on_remote = true;
        store.put(TableName::Categories, &local).await.unwrap();

        let incoming = remote_copy(&local, "Same", Duration::zero());
        let outcome = merge_remote(&store, TableName::Categories, &incoming)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome::KeptLocal);
        assert!(store.list_conflicts(10).await.unwrap().is_empty());
    }
}
