//! Backoff and quarantine for records the remote keeps rejecting.
//!
//! Only rejections count. Transient failures (network, timeouts, 5xx) leave
//! no trace and the record is retried on the next pass.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::models::{RecordId, SyncFailure, TableName};
use crate::remote::RemoteError;
use crate::store::LocalStore;
use crate::util::compact_text;

/// Whether push may try a record now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Ready,
    /// Waiting out its backoff delay
    Deferred,
    /// Quarantined until retried explicitly
    Stuck,
}

pub async fn gate(
    store: &dyn LocalStore,
    policy: &RetryPolicy,
    table: TableName,
    id: &RecordId,
    now: DateTime<Utc>,
) -> Result<Gate> {
    let Some(failure) = store.get_failure(table, id).await? else {
        return Ok(Gate::Ready);
    };
    if policy.is_exhausted(failure.attempts) {
        Ok(Gate::Stuck)
    } else if failure.next_attempt_at > now {
        Ok(Gate::Deferred)
    } else {
        Ok(Gate::Ready)
    }
}

/// Count a rejection and schedule the next attempt
pub async fn record_rejection(
    store: &dyn LocalStore,
    policy: &RetryPolicy,
    table: TableName,
    id: &RecordId,
    error: &RemoteError,
    now: DateTime<Utc>,
) -> Result<SyncFailure> {
    let attempts = store
        .get_failure(table, id)
        .await?
        .map_or(0, |failure| failure.attempts)
        .saturating_add(1);
    let delay = ChronoDuration::from_std(policy.delay_for(attempts))
        .unwrap_or_else(|_| ChronoDuration::hours(1));
    let failure = SyncFailure {
        table,
        record_id: id.clone(),
        attempts,
        last_error: compact_text(&error.to_string()),
        last_attempt_at: now,
        next_attempt_at: now + delay,
    };
    store.put_failure(&failure).await?;

    if policy.is_exhausted(attempts) {
        tracing::warn!(
            table = %table,
            id = %id,
            attempts,
            "Record quarantined after repeated rejections: {error}"
        );
    }
    Ok(failure)
}

/// Quarantined records under `policy`
pub async fn stuck_records(
    store: &dyn LocalStore,
    policy: &RetryPolicy,
) -> Result<Vec<SyncFailure>> {
    Ok(store
        .list_failures()
        .await?
        .into_iter()
        .filter(|failure| policy.is_exhausted(failure.attempts))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn rejection() -> RemoteError {
        RemoteError::Api {
            status: 400,
            message: "invalid input syntax".to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejections_back_off_then_quarantine() {
        let store = MemoryStore::new();
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
        };
        let id = RecordId::from("r1");
        let now = Utc::now();

        assert_eq!(
            gate(&store, &policy, TableName::Income, &id, now).await.unwrap(),
            Gate::Ready
        );

        let first = record_rejection(&store, &policy, TableName::Income, &id, &rejection(), now)
            .await
            .unwrap();
        assert_eq!(first.attempts, 1);
        assert_eq!(
            gate(&store, &policy, TableName::Income, &id, now).await.unwrap(),
            Gate::Deferred
        );
        let later = now + ChronoDuration::minutes(2);
        assert_eq!(
            gate(&store, &policy, TableName::Income, &id, later).await.unwrap(),
            Gate::Ready
        );

        record_rejection(&store, &policy, TableName::Income, &id, &rejection(), later)
            .await
            .unwrap();
        assert_eq!(
            gate(&store, &policy, TableName::Income, &id, later).await.unwrap(),
            Gate::Stuck
        );
        assert_eq!(stuck_records(&store, &policy).await.unwrap().len(), 1);
    }
}
