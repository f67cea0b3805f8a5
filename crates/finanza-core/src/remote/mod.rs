//! Remote backend contract.
//!
//! The hosted store exposes row-level select/insert/upsert/update/delete per
//! table. Rows travel as JSON objects in wire format (see
//! [`Record::to_remote_payload`](crate::models::Record::to_remote_payload)).

mod disconnected;
mod memory;
mod supabase;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Fields, RecordId, TableName};

pub use disconnected::DisconnectedRemote;
pub use memory::{MemoryRemote, RemoteCall, RemoteOp};
pub use supabase::SupabaseRemote;

/// A row as exchanged with the remote backend
pub type RemoteRow = Value;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote backend unreachable: {0}")]
    Unreachable(String),
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote backend is not configured")]
    NotConfigured,
}

impl RemoteError {
    /// Transient failures are retried on the next pass without counting
    /// against the record.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout(_) | Self::NotConfigured => true,
            Self::Http(error) => {
                error.is_connect() || error.is_timeout() || error.is_request() || error.is_body()
            }
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::InvalidPayload(_) => false,
        }
    }

    /// Whether the remote may have applied a write even though the call
    /// failed: the request left this device but no answer came back.
    pub fn may_have_applied(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(error) => !error.is_connect() && !error.is_builder(),
            Self::Api { status, .. } => *status >= 500,
            Self::Unreachable(_) | Self::InvalidPayload(_) | Self::NotConfigured => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Row filter for `select`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFilter {
    pub user_id: String,
    /// Applied only to tables with a month dimension
    pub month_ref: Option<String>,
}

impl RemoteFilter {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            month_ref: None,
        }
    }

    #[must_use]
    pub fn with_month(mut self, month_ref: Option<String>) -> Self {
        self.month_ref = month_ref;
        self
    }
}

/// Hosted relational store holding the authoritative copy of every table.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Rows of `table` matching the filter
    async fn select(&self, table: TableName, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRow>>;

    /// The row with `id`, if the remote holds one
    async fn fetch(&self, table: TableName, id: &RecordId) -> RemoteResult<Option<RemoteRow>>;

    /// Insert a new row
    async fn insert(&self, table: TableName, row: &RemoteRow) -> RemoteResult<()>;

    /// Insert or replace a row keyed by `id`
    async fn upsert(&self, table: TableName, row: &RemoteRow) -> RemoteResult<()>;

    /// Apply a partial update to the row with `id`
    async fn update(&self, table: TableName, id: &RecordId, patch: &Fields) -> RemoteResult<()>;

    /// Delete the row with `id`; deleting a missing row succeeds
    async fn delete(&self, table: TableName, id: &RecordId) -> RemoteResult<()>;

    /// Cheap reachability check
    async fn ping(&self) -> RemoteResult<()>;
}

/// Bound a remote call by `limit`, mapping expiry to [`RemoteError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>> + Send,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn with_timeout_maps_expiry() {
        let result: RemoteResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RemoteError::Timeout(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn with_timeout_passes_results_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn classifies_transient_errors() {
        assert!(RemoteError::Unreachable("offline".into()).is_transient());
        assert!(RemoteError::Timeout(Duration::from_secs(15)).is_transient());
        assert!(RemoteError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!RemoteError::Api {
            status: 400,
            message: "violates check constraint".into()
        }
        .is_transient());
        assert!(!RemoteError::InvalidPayload("bad".into()).is_transient());
    }

    #[test]
    fn only_unanswered_writes_may_have_applied() {
        assert!(RemoteError::Timeout(Duration::from_secs(15)).may_have_applied());
        assert!(RemoteError::Api {
            status: 502,
            message: "bad gateway".into()
        }
        .may_have_applied());
        assert!(!RemoteError::Unreachable("offline".into()).may_have_applied());
        assert!(!RemoteError::Api {
            status: 409,
            message: "duplicate key".into()
        }
        .may_have_applied());
        assert!(!RemoteError::NotConfigured.may_have_applied());
    }
}
