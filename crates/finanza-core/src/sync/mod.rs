//! Sync engine: pushes pending local changes and pulls remote truth.
//!
//! A full sync pushes every unsynced record (upserts and tombstones), then
//! pulls every remote row of the user and merges it by last-writer-wins on
//! `updated_at`. A pending change is only sent when the remote copy is not
//! strictly newer. Only one full sync runs at a time per engine.

mod merge;
mod retry;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{Record, RecordId, SyncFailure, TableName};
use crate::remote::{with_timeout, RemoteBackend, RemoteFilter, RemoteResult};
use crate::store::{LocalStore, LAST_SYNC_KEY};
use crate::util::{format_timestamp, parse_timestamp, timestamp_now};

pub use merge::{merge_remote, MergeOutcome};
pub use retry::Gate;

/// Counters from the push phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub pushed: usize,
    pub failed: usize,
    /// Skipped while waiting out a backoff delay
    pub deferred: usize,
    /// Skipped because quarantined
    pub stuck: usize,
    /// Tombstones of records the remote never saw, removed locally
    pub collapsed: usize,
    /// Not sent because the remote copy was newer; the remote copy was kept
    pub superseded: usize,
}

/// Counters from the pull phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub pulled: usize,
    /// Remote rows ignored because the local copy was as new or newer
    pub kept_local: usize,
    /// Local copies of rows deleted on another device
    pub removed: usize,
    pub failed: usize,
}

/// Outcome of [`SyncEngine::full_sync`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: bool,
    /// Another sync was already running; nothing was done
    pub busy: bool,
    pub pushed: usize,
    pub pulled: usize,
    pub superseded: usize,
    pub kept_local: usize,
    pub push_errors: usize,
    pub pull_errors: usize,
    pub deferred: usize,
    pub stuck: usize,
    pub collapsed: usize,
    pub removed: usize,
    pub message: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    fn busy() -> Self {
        Self {
            success: false,
            busy: true,
            pushed: 0,
            pulled: 0,
            superseded: 0,
            kept_local: 0,
            push_errors: 0,
            pull_errors: 0,
            deferred: 0,
            stuck: 0,
            collapsed: 0,
            removed: 0,
            message: "Sync already in progress".to_string(),
            completed_at: None,
        }
    }

    fn from_phases(push: &PushSummary, pull: &PullSummary, completed_at: DateTime<Utc>) -> Self {
        let errors = push.failed + pull.failed;
        let mut message = if errors == 0 {
            format!("Synced: {} sent, {} received", push.pushed, pull.pulled)
        } else {
            format!(
                "Sync finished with {errors} error(s): {} sent, {} received",
                push.pushed, pull.pulled
            )
        };
        if push.superseded > 0 {
            message.push_str(&format!(
                ", {} local edit(s) replaced by newer remote copies",
                push.superseded
            ));
        }
        if push.stuck > 0 {
            message.push_str(&format!(", {} record(s) need attention", push.stuck));
        }

        Self {
            success: errors == 0,
            busy: false,
            pushed: push.pushed,
            pulled: pull.pulled,
            superseded: push.superseded,
            kept_local: pull.kept_local,
            push_errors: push.failed,
            pull_errors: pull.failed,
            deferred: push.deferred,
            stuck: push.stuck,
            collapsed: push.collapsed,
            removed: pull.removed,
            message,
            completed_at: Some(completed_at),
        }
    }

    pub const fn errors(&self) -> usize {
        self.push_errors + self.pull_errors
    }
}

/// Releases the single-flight flag when the sync finishes or is dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What the remote did with one pending change
enum Sent {
    Applied,
    /// The remote holds a strictly newer copy, returned here
    Superseded(Record),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushStep {
    Pushed,
    Collapsed,
    Superseded,
    Deferred,
    Stuck,
    Failed,
}

/// Reconciles one local store with one remote backend.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteBackend>,
    config: SyncConfig,
    in_progress: AtomicBool,
    last_report: Mutex<Option<SyncReport>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteBackend>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            remote,
            config,
            in_progress: AtomicBool::new(false),
            last_report: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Report of the most recent completed full sync in this process
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.lock().clone()
    }

    /// Completion time of the last full sync, persisted in the store
    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        match self.store.get_meta(LAST_SYNC_KEY).await {
            Ok(value) => value.as_deref().and_then(parse_timestamp),
            Err(error) => {
                tracing::warn!("Failed to read last sync time: {error}");
                None
            }
        }
    }

    /// Push pending changes, then pull remote truth for `user_id`.
    ///
    /// Never fails: errors are counted in the report. A call made while
    /// another full sync is running returns a busy report immediately.
    pub async fn full_sync(&self, user_id: &str) -> SyncReport {
        let Some(_flight) = InFlight::acquire(&self.in_progress) else {
            tracing::info!("Sync already in progress");
            return SyncReport::busy();
        };

        tracing::info!(user_id, "Starting full sync");
        let push = self.push_to_remote(user_id).await;
        let pull = self.pull_from_remote(user_id).await;

        let completed_at = timestamp_now();
        if let Err(error) = self
            .store
            .set_meta(LAST_SYNC_KEY, &format_timestamp(&completed_at))
            .await
        {
            tracing::warn!("Failed to record last sync time: {error}");
        }

        let report = SyncReport::from_phases(&push, &pull, completed_at);
        if report.success {
            tracing::info!("{}", report.message);
        } else {
            tracing::warn!("{}", report.message);
        }
        *self.last_report.lock() = Some(report.clone());
        report
    }

    /// Send every pending change of `user_id` to the remote, table by table.
    pub async fn push_to_remote(&self, user_id: &str) -> PushSummary {
        let mut summary = PushSummary::default();

        for table in TableName::ALL {
            let pending = match self.store.get_unsynced(table).await {
                Ok(pending) => pending,
                Err(error) => {
                    tracing::warn!(table = %table, "Failed to read pending changes: {error}");
                    summary.failed += 1;
                    continue;
                }
            };

            for record in pending {
                if record.user_id != user_id {
                    tracing::warn!(
                        table = %table,
                        id = %record.id,
                        "Skipping pending change owned by another user"
                    );
                    continue;
                }
                match self.push_record(table, &record).await {
                    PushStep::Pushed => summary.pushed += 1,
                    PushStep::Collapsed => summary.collapsed += 1,
                    PushStep::Superseded => summary.superseded += 1,
                    PushStep::Deferred => summary.deferred += 1,
                    PushStep::Stuck => summary.stuck += 1,
                    PushStep::Failed => summary.failed += 1,
                }
            }
        }

        tracing::debug!(?summary, "Push finished");
        summary
    }

    async fn push_record(&self, table: TableName, record: &Record) -> PushStep {
        let store = self.store.as_ref();
        let policy = &self.config.retry;
        let now = timestamp_now();

        match retry::gate(store, policy, table, &record.id, now).await {
            Ok(Gate::Ready) => {}
            Ok(Gate::Deferred) => return PushStep::Deferred,
            Ok(Gate::Stuck) => return PushStep::Stuck,
            Err(error) => {
                tracing::warn!(table = %table, id = %record.id, "Failed to read retry state: {error}");
                return PushStep::Failed;
            }
        }

        if record.deleted && !record.on_remote {
            return match store.hard_delete(table, &record.id).await {
                Ok(()) => PushStep::Collapsed,
                Err(error) => {
                    tracing::warn!(table = %table, id = %record.id, "Failed to purge local tombstone: {error}");
                    PushStep::Failed
                }
            };
        }

        match self.send(table, record).await {
            Ok(Sent::Applied) => match self.confirm_push(table, record).await {
                Ok(()) => {
                    tracing::debug!(table = %table, id = %record.id, deleted = record.deleted, "Pushed record");
                    PushStep::Pushed
                }
                Err(error) => {
                    tracing::warn!(table = %table, id = %record.id, "Pushed record but failed to update local state: {error}");
                    PushStep::Failed
                }
            },
            Ok(Sent::Superseded(current)) => match self.yield_to_remote(table, &current).await {
                Ok(()) => PushStep::Superseded,
                Err(error) => {
                    tracing::warn!(table = %table, id = %record.id, "Failed to store newer remote copy: {error}");
                    PushStep::Failed
                }
            },
            Err(error) => {
                if !record.deleted && error.may_have_applied() {
                    if let Err(store_error) = assume_on_remote(store, table, &record.id).await {
                        tracing::warn!(table = %table, id = %record.id, "Failed to flag record as possibly pushed: {store_error}");
                    }
                }
                if error.is_transient() {
                    tracing::debug!(table = %table, id = %record.id, "Push failed, will retry: {error}");
                } else {
                    tracing::warn!(table = %table, id = %record.id, "Push rejected: {error}");
                    if let Err(store_error) =
                        retry::record_rejection(store, policy, table, &record.id, &error, now).await
                    {
                        tracing::warn!("Failed to record push rejection: {store_error}");
                    }
                }
                PushStep::Failed
            }
        }
    }

    /// Send one pending change unless the remote copy is strictly newer.
    ///
    /// Only records the remote may already hold are compared; a record that
    /// never left this device cannot have a newer remote copy.
    async fn send(&self, table: TableName, record: &Record) -> RemoteResult<Sent> {
        let timeout = self.config.call_timeout;
        if record.on_remote {
            if let Some(row) = with_timeout(timeout, self.remote.fetch(table, &record.id)).await? {
                match Record::from_remote(row) {
                    Ok(current) if current.updated_at > record.updated_at => {
                        return Ok(Sent::Superseded(current));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!(table = %table, id = %record.id, "Remote copy is malformed, overwriting it: {error}");
                    }
                }
            }
        }

        if record.deleted {
            with_timeout(timeout, self.remote.delete(table, &record.id)).await?;
        } else {
            let payload = record.to_remote_payload();
            with_timeout(timeout, self.remote.upsert(table, &payload)).await?;
        }
        Ok(Sent::Applied)
    }

    /// Keep the newer remote copy instead of the pending local change.
    async fn yield_to_remote(&self, table: TableName, current: &Record) -> Result<()> {
        tracing::debug!(table = %table, id = %current.id, "Remote copy is newer, skipping push");
        merge_remote(self.store.as_ref(), table, current).await?;
        self.store.clear_failure(table, &current.id).await
    }

    /// Update local state after the remote accepted `pushed`.
    ///
    /// A record edited while the push was in flight stays pending.
    async fn confirm_push(&self, table: TableName, pushed: &Record) -> Result<()> {
        if pushed.deleted {
            return self.store.hard_delete(table, &pushed.id).await;
        }

        self.store.clear_failure(table, &pushed.id).await?;
        let current = self.store.get_by_id(table, &pushed.id).await?;
        match current {
            Some(current)
                if current.updated_at == pushed.updated_at && current.deleted == pushed.deleted =>
            {
                self.store.mark_synced(table, &pushed.id).await
            }
            Some(mut current) if !current.on_remote => {
                current.on_remote = true;
                self.store.put(table, &current).await
            }
            _ => Ok(()),
        }
    }

    /// Fetch every remote row of `user_id` and merge it into the store.
    pub async fn pull_from_remote(&self, user_id: &str) -> PullSummary {
        let mut summary = PullSummary::default();
        let filter = RemoteFilter::user(user_id);

        for table in TableName::ALL {
            let started_at = timestamp_now();
            let rows = match with_timeout(self.config.call_timeout, self.remote.select(table, &filter)).await {
                Ok(rows) => rows,
                Err(error) => {
                    tracing::warn!(table = %table, "Pull failed: {error}");
                    summary.failed += 1;
                    continue;
                }
            };

            let mut seen = HashSet::with_capacity(rows.len());
            for row in rows {
                let incoming = match Record::from_remote(row) {
                    Ok(record) if record.user_id == user_id => record,
                    Ok(record) => {
                        tracing::warn!(table = %table, id = %record.id, "Ignoring remote row owned by another user");
                        continue;
                    }
                    Err(error) => {
                        tracing::warn!(table = %table, "Ignoring malformed remote row: {error}");
                        summary.failed += 1;
                        continue;
                    }
                };
                seen.insert(incoming.id.clone());

                match merge_remote(self.store.as_ref(), table, &incoming).await {
                    Ok(outcome) if outcome.applied() => summary.pulled += 1,
                    Ok(_) => summary.kept_local += 1,
                    Err(error) => {
                        tracing::warn!(table = %table, id = %incoming.id, "Failed to store remote row: {error}");
                        summary.failed += 1;
                    }
                }
            }

            match self.prune_deleted_elsewhere(table, user_id, &seen, started_at).await {
                Ok(removed) => summary.removed += removed,
                Err(error) => {
                    tracing::warn!(table = %table, "Failed to prune remotely deleted rows: {error}");
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(?summary, "Pull finished");
        summary
    }

    /// Remove synced local copies whose remote row no longer exists.
    ///
    /// Records touched after `started_at` are left alone: the remote listing
    /// predates them.
    async fn prune_deleted_elsewhere(
        &self,
        table: TableName,
        user_id: &str,
        seen: &HashSet<RecordId>,
        started_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut removed = 0;
        for local in self.store.get_all(table, user_id).await? {
            if local.synced
                && local.on_remote
                && local.updated_at < started_at
                && !seen.contains(&local.id)
            {
                tracing::debug!(table = %table, id = %local.id, "Removing row deleted on another device");
                self.store.hard_delete(table, &local.id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Records quarantined after repeated rejections
    pub async fn stuck_records(&self) -> Result<Vec<SyncFailure>> {
        retry::stuck_records(self.store.as_ref(), &self.config.retry).await
    }

    /// Clear every failure entry so the next sync retries all records.
    ///
    /// Returns how many entries were cleared.
    pub async fn retry_stuck(&self) -> Result<usize> {
        let failures = self.store.list_failures().await?;
        for failure in &failures {
            self.store
                .clear_failure(failure.table, &failure.record_id)
                .await?;
        }
        tracing::info!(cleared = failures.len(), "Cleared sync failures");
        Ok(failures.len())
    }
}

/// Flag a record as possibly held by the remote after a write whose answer
/// was lost, so a later delete is sent instead of collapsing locally.
pub(crate) async fn assume_on_remote(
    store: &dyn LocalStore,
    table: TableName,
    id: &RecordId,
) -> Result<()> {
    match store.get_by_id(table, id).await? {
        Some(mut record) if !record.on_remote => {
            record.on_remote = true;
            store.put(table, &record).await
        }
        _ => Ok(()),
    }
}
