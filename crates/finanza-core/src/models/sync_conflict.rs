//! Sync conflict model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{RecordId, TableName};
use crate::error::Error;

/// Which copy survived a last-writer-wins decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictWinner {
    Local,
    Remote,
}

impl ConflictWinner {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for ConflictWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictWinner {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(Error::InvalidInput(format!("Unknown conflict winner: {other}"))),
        }
    }
}

/// Conflict about to be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncConflict {
    pub table: TableName,
    pub record_id: RecordId,
    pub local_updated_at: DateTime<Utc>,
    pub remote_updated_at: DateTime<Utc>,
    pub winner: ConflictWinner,
}

/// Recorded sync conflict resolved by last-writer-wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Table of the record involved in the conflict
    pub table: TableName,
    /// Record involved in the conflict
    pub record_id: RecordId,
    /// Pending local copy's timestamp
    pub local_updated_at: DateTime<Utc>,
    /// Remote copy's timestamp
    pub remote_updated_at: DateTime<Utc>,
    /// Copy that was kept
    pub winner: ConflictWinner,
    /// Resolution timestamp
    pub resolved_at: DateTime<Utc>,
}
