//! Per-record push failures tracked for backoff and quarantine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, TableName};

/// A record the remote backend keeps rejecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub table: TableName,
    pub record_id: RecordId,
    /// Consecutive rejected pushes
    pub attempts: u32,
    pub last_error: String,
    pub last_attempt_at: DateTime<Utc>,
    /// The record is skipped by push until this instant
    pub next_attempt_at: DateTime<Utc>,
}
