//! Runtime configuration for the sync subsystem.
//!
//! `SyncConfig` tunes the engine and facade, `RemoteConfig` locates the
//! Supabase REST endpoint and `StoreBackend` selects the local cache.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_CALL_TIMEOUT_SECS: u64 = 15;
const MIN_CALL_TIMEOUT_SECS: u64 = 10;
const MAX_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

/// Backoff and quarantine policy for records the remote keeps rejecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Rejections after which a record is quarantined
    pub max_attempts: u32,
    /// Delay after the first rejection
    pub base_delay: Duration,
    /// Upper bound for the exponential delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60 * 60),
        }
    }
}

impl RetryPolicy {
    /// Retry on the very next pass, quarantining after `max_attempts`
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the next push after `attempts` consecutive rejections
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempts - 1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    /// Whether a record with this many rejections is quarantined
    pub const fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Configuration for the sync engine and the data access facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upper bound for every individual remote call
    pub call_timeout: Duration,
    /// Periodic full sync interval (default: 60 seconds)
    pub sync_interval: Option<Duration>,
    /// Reachability check interval (default: 30 seconds)
    pub ping_interval: Option<Duration>,
    /// Backoff for rejected records
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            sync_interval: Some(Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS)),
            ping_interval: Some(Duration::from_secs(DEFAULT_PING_INTERVAL_SECS)),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Set the per-call timeout, clamped to 10..=30 seconds
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout.clamp(
            Duration::from_secs(MIN_CALL_TIMEOUT_SECS),
            Duration::from_secs(MAX_CALL_TIMEOUT_SECS),
        );
        self
    }

    /// Set the per-call timeout without clamping (tests and demos)
    #[must_use]
    pub const fn with_raw_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Disable automatic sync (manual sync and reconnects only)
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Set the reachability check interval
    #[must_use]
    pub const fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Disable reachability probing
    #[must_use]
    pub const fn without_ping(mut self) -> Self {
        self.ping_interval = None;
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Connection settings for the Supabase REST backend
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base REST URL, always ending in `/rest/v1`
    pub rest_url: String,
    /// Public anon key sent as `apikey`
    pub anon_key: String,
    /// User access token; the anon key is used as bearer when absent
    pub access_token: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let rest_url = normalize_rest_url(url)?;
        let anon_key = normalize_text_option(Some(anon_key.into())).ok_or_else(|| {
            Error::InvalidInput("Supabase anon key must not be empty".to_string())
        })?;
        Ok(Self {
            rest_url,
            anon_key,
            access_token: None,
        })
    }

    /// Authenticate requests with a user access token
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = normalize_text_option(token);
        self
    }

    /// Token sent in the `Authorization: Bearer` header
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Normalize a Supabase project URL into its PostgREST base URL.
pub fn normalize_rest_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(Error::InvalidInput(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

/// Local cache backend chosen at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Durable `SQLite` file
    Sqlite(PathBuf),
    /// In-process store, lost when the process exits
    Memory,
}

impl StoreBackend {
    /// Prefer a durable file under `data_dir`; fall back to memory when the
    /// device exposes no writable data directory.
    pub fn detect(data_dir: Option<PathBuf>) -> Self {
        data_dir.map_or(Self::Memory, |dir| Self::Sqlite(dir.join("finanza.db")))
    }

    pub const fn is_durable(&self) -> bool {
        matches!(self, Self::Sqlite(_))
    }
}

/// Everything needed to open a session for one user
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_id: String,
    pub store: StoreBackend,
    pub sync: SyncConfig,
}

impl SessionConfig {
    pub fn new(user_id: impl Into<String>, store: StoreBackend) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            sync: SyncConfig::default(),
        }
    }

    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}
