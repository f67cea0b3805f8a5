//! Shared sync state types for status displays.

use serde::Serialize;

/// Unified sync state shown by every client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncState {
    /// Derive the state from the session signals.
    ///
    /// `last_sync_ok` is `None` before the first sync of this process.
    pub const fn from_signals(is_online: bool, is_syncing: bool, last_sync_ok: Option<bool>) -> Self {
        if !is_online {
            Self::Offline
        } else if is_syncing {
            Self::Syncing
        } else if matches!(last_sync_ok, Some(false)) {
            Self::Error
        } else {
            Self::Synced
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
