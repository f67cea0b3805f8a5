//! Per-user wiring of store, remote, connectivity, sync engine and facade.
//!
//! Nothing here is global: a client opens one [`Session`] per signed-in
//! user and hands it to whatever needs data access or sync status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::{SessionConfig, SyncConfig};
use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::error::Result;
use crate::facade::DataAccess;
use crate::models::{SyncConflict, SyncFailure};
use crate::remote::RemoteBackend;
use crate::state::SyncState;
use crate::store::{open_local_store, LocalStore};
use crate::sync::{SyncEngine, SyncReport};

/// Snapshot of the UI-facing sync signals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub store_available: bool,
}

/// Result of a user-triggered sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    /// Present when a sync actually ran
    pub report: Option<SyncReport>,
}

impl SyncOutcome {
    fn skipped(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            report: None,
        }
    }
}

pub struct Session {
    user_id: String,
    sync_config: SyncConfig,
    store: Option<Arc<dyn LocalStore>>,
    remote: Arc<dyn RemoteBackend>,
    connectivity: ConnectivityMonitor,
    engine: Option<Arc<SyncEngine>>,
    data: DataAccess,
    _reconnect: Option<Subscription>,
}

impl Session {
    /// Open the configured local store and wire everything around it.
    ///
    /// An unavailable store is not fatal: the session runs in remote-only
    /// mode with no sync engine.
    pub async fn open(
        config: SessionConfig,
        remote: Arc<dyn RemoteBackend>,
        initially_online: bool,
    ) -> Self {
        let store = match open_local_store(&config.store).await {
            Ok(store) => Some(store),
            Err(error) => {
                tracing::warn!("Continuing without a local cache: {error}");
                None
            }
        };
        Self::from_parts(config.user_id, store, remote, config.sync, initially_online)
    }

    /// Wire a session around an already opened store.
    pub fn from_parts(
        user_id: impl Into<String>,
        store: Option<Arc<dyn LocalStore>>,
        remote: Arc<dyn RemoteBackend>,
        sync_config: SyncConfig,
        initially_online: bool,
    ) -> Self {
        let user_id = user_id.into();
        let connectivity = ConnectivityMonitor::new(initially_online);
        let engine = store.as_ref().map(|store| {
            Arc::new(SyncEngine::new(
                Arc::clone(store),
                Arc::clone(&remote),
                sync_config.clone(),
            ))
        });
        let reconnect = engine
            .as_ref()
            .map(|engine| connectivity.sync_on_reconnect(Arc::clone(engine), user_id.clone()));
        let data = DataAccess::new(
            user_id.clone(),
            store.clone(),
            Arc::clone(&remote),
            connectivity.clone(),
            sync_config.call_timeout,
        );

        Self {
            user_id,
            sync_config,
            store,
            remote,
            connectivity,
            engine,
            data,
            _reconnect: reconnect,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub const fn data(&self) -> &DataAccess {
        &self.data
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn store(&self) -> Option<&Arc<dyn LocalStore>> {
        self.store.as_ref()
    }

    pub fn engine(&self) -> Option<&Arc<SyncEngine>> {
        self.engine.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.current_state()
    }

    pub fn is_syncing(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_syncing())
    }

    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        match &self.engine {
            Some(engine) => engine.last_sync_time().await,
            None => None,
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let is_online = self.is_online();
        let is_syncing = self.is_syncing();
        let last_sync_ok = self
            .engine
            .as_ref()
            .and_then(|engine| engine.last_report())
            .map(|report| report.success);
        SyncStatus {
            state: SyncState::from_signals(is_online, is_syncing, last_sync_ok),
            is_online,
            is_syncing,
            last_sync_time: self.last_sync_time().await,
            store_available: self.store.is_some(),
        }
    }

    /// Run a full sync now, unless offline or without a local cache.
    pub async fn trigger_sync(&self) -> SyncOutcome {
        if !self.is_online() {
            return SyncOutcome::skipped("Offline: changes will sync when the connection returns");
        }
        let Some(engine) = &self.engine else {
            return SyncOutcome::skipped("Local store unavailable; nothing to sync");
        };

        let report = engine.full_sync(&self.user_id).await;
        SyncOutcome {
            success: report.success,
            message: report.message.clone(),
            report: Some(report),
        }
    }

    /// Sync every `interval` while online. The first tick fires immediately.
    pub fn spawn_periodic_sync(&self, interval: Duration) -> Option<JoinHandle<()>> {
        let engine = Arc::clone(self.engine.as_ref()?);
        let connectivity = self.connectivity.clone();
        let user_id = self.user_id.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !connectivity.current_state() {
                    continue;
                }
                let report = engine.full_sync(&user_id).await;
                tracing::debug!(?report, "Periodic sync finished");
            }
        }))
    }

    /// Start the reachability check configured for this session.
    pub fn spawn_connectivity_check(&self) -> Option<JoinHandle<()>> {
        let interval = self.sync_config.ping_interval?;
        Some(self.connectivity.spawn_reachability_check(
            Arc::clone(&self.remote),
            interval,
            self.sync_config.call_timeout,
        ))
    }

    /// Periodic sync and probing as configured; handles of started tasks.
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        let periodic = self
            .sync_config
            .sync_interval
            .and_then(|interval| self.spawn_periodic_sync(interval));
        periodic
            .into_iter()
            .chain(self.spawn_connectivity_check())
            .collect()
    }

    pub async fn stuck_records(&self) -> Result<Vec<SyncFailure>> {
        match &self.engine {
            Some(engine) => engine.stuck_records().await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn retry_stuck(&self) -> Result<usize> {
        match &self.engine {
            Some(engine) => engine.retry_stuck().await,
            None => Ok(0),
        }
    }

    /// Most recent last-writer-wins decisions
    pub async fn conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        match &self.store {
            Some(store) => store.list_conflicts(limit).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::models::{RecordId, TableName};
    use crate::remote::MemoryRemote;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn session(online: bool) -> (Session, Arc<MemoryRemote>) {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_reachable(online);
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
        let session = Session::from_parts(
            "user-1",
            Some(store),
            remote.clone(),
            SyncConfig::default().without_auto_sync().without_ping(),
            online,
        );
        (session, remote)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_sync_offline_does_not_touch_remote() {
        let (session, remote) = session(false);
        let outcome = session.trigger_sync().await;
        assert!(!outcome.success);
        assert!(outcome.report.is_none());
        assert!(remote.calls().is_empty());
        assert_eq!(session.status().await.state, SyncState::Offline);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_sync_records_last_sync_time() {
        let (session, _remote) = session(true);
        assert!(session.last_sync_time().await.is_none());

        let outcome = session.trigger_sync().await;
        assert!(outcome.success);
        let status = session.status().await;
        assert_eq!(status.state, SyncState::Synced);
        assert!(status.last_sync_time.is_some());
        assert!(status.store_available);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unavailable_store_falls_back_to_remote_only() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let config = SessionConfig::new("user-1", StoreBackend::Sqlite(dir.path().to_path_buf()));
        let session = Session::open(config, remote.clone(), true).await;

        assert!(session.store().is_none());
        assert!(session.engine().is_none());
        assert!(!session.status().await.store_available);

        let fields = json!({"nome": "Lazer"}).as_object().cloned().unwrap();
        let outcome = session.data().write(TableName::Categories, fields).await;
        assert!(outcome.success);
        let id: RecordId = outcome.record.unwrap().id;
        assert!(remote.row(TableName::Categories, &id).is_some());

        assert!(!session.trigger_sync().await.success);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_tasks_respect_config() {
        let (session, _remote) = session(true);
        assert!(session.spawn_background().is_empty());

        let periodic = session.spawn_periodic_sync(Duration::from_secs(3600)).unwrap();
        periodic.abort();
    }
}
