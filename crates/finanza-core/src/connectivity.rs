//! Connectivity monitor.
//!
//! Tracks whether the remote is believed reachable and notifies subscribers
//! on transitions only. Observations come from the platform (via
//! [`ConnectivityMonitor::set_online`]) or from a background reachability check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::remote::{with_timeout, RemoteBackend};
use crate::sync::SyncEngine;

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

struct MonitorInner {
    state: watch::Sender<bool>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Shared handle to the current online/offline state
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConnectivityMonitor")
            .field("online", &self.current_state())
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

/// Keeps a callback registered; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    inner: Weak<MonitorInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            inner: Arc::new(MonitorInner {
                state,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn current_state(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Register `callback` for every future transition
    pub fn subscribe(&self, callback: impl Fn(bool) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(callback);
        self.inner.listeners.lock().push((id, listener));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Receiver for async consumers; sees the same transitions
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Feed a new observation; listeners run only if the state changed.
    pub fn set_online(&self, online: bool) {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return;
        }

        tracing::info!(online, "Connectivity changed");
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(online);
        }
    }

    /// Run a full sync for `user_id` on every transition to online.
    ///
    /// The sync is spawned on the current Tokio runtime and never awaited.
    pub fn sync_on_reconnect(&self, engine: Arc<SyncEngine>, user_id: impl Into<String>) -> Subscription {
        let user_id: String = user_id.into();
        self.subscribe(move |online| {
            if !online {
                tracing::info!("Offline: changes will be kept locally until the connection returns");
                return;
            }
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                tracing::warn!("No async runtime available; skipping reconnect sync");
                return;
            };
            let engine = Arc::clone(&engine);
            let user_id = user_id.clone();
            handle.spawn(async move {
                tracing::info!("Connection restored, syncing");
                let report = engine.full_sync(&user_id).await;
                tracing::debug!(?report, "Reconnect sync finished");
            });
        })
    }

    /// Periodically ping `remote` and feed the result into the monitor.
    pub fn spawn_reachability_check(
        &self,
        remote: Arc<dyn RemoteBackend>,
        interval: Duration,
        timeout: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = with_timeout(timeout, remote.ping()).await;
                if let Err(error) = &reachable {
                    tracing::debug!("Connectivity check failed: {error}");
                }
                monitor.set_online(reachable.is_ok());
            }
        })
    }

    /// Ping `remote` once and record the answer
    pub async fn check_once(&self, remote: &dyn RemoteBackend, timeout: Duration) -> bool {
        let online = with_timeout(timeout, remote.ping()).await.is_ok();
        self.set_online(online);
        online
    }
}
