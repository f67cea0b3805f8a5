//! Record model shared by every tracked table

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::month::{month_ref_from_date, normalize_month_ref, MONTH_FIELD};
use super::TableName;
use crate::error::{Error, Result};
use crate::util::{format_timestamp, timestamp_now};

/// Domain fields of a record (amounts, descriptions, dates, ...).
pub type Fields = Map<String, Value>;

/// Keys managed by the sync layer; callers can never set them as domain fields.
pub const RESERVED_FIELDS: [&str; 7] = [
    "id",
    "user_id",
    "created_at",
    "updated_at",
    "synced",
    "deleted",
    "on_remote",
];

/// A unique identifier for a record, generated on the device as a UUID v7
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Record ID must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A row of one of the tracked tables, as cached on the device.
///
/// `synced`, `deleted` and `on_remote` exist only locally and are stripped
/// from everything sent to the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier, stable for the record's lifetime
    pub id: RecordId,
    /// Owner of the record
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp, the authority for conflict resolution
    pub updated_at: DateTime<Utc>,
    /// Local copy matches the last-known remote state
    #[serde(default)]
    pub synced: bool,
    /// Tombstone awaiting remote deletion
    #[serde(default)]
    pub deleted: bool,
    /// The remote backend is known to hold a row with this ID
    #[serde(default)]
    pub on_remote: bool,
    /// Table-specific fields
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Create a new, unsynced record owned by `user_id`
    #[must_use]
    pub fn new(user_id: impl Into<String>, fields: Fields) -> Self {
        let now = timestamp_now();
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            synced: false,
            deleted: false,
            on_remote: false,
            fields: sanitize_fields(fields),
        }
    }

    /// Decode a row returned by the remote backend.
    ///
    /// The result is marked synced and known to the remote.
    pub fn from_remote(row: Value) -> Result<Self> {
        let mut record: Self = serde_json::from_value(row)?;
        if record.id.as_str().trim().is_empty() {
            return Err(Error::InvalidInput("Remote row has an empty id".into()));
        }
        record.fields = sanitize_fields(record.fields);
        record.synced = true;
        record.deleted = false;
        record.on_remote = true;
        Ok(record)
    }

    /// Wire representation: every field except the local-only ones.
    pub fn to_remote_payload(&self) -> Value {
        let mut row = Map::with_capacity(self.fields.len() + 4);
        row.insert("id".into(), Value::String(self.id.to_string()));
        row.insert("user_id".into(), Value::String(self.user_id.clone()));
        row.insert(
            "created_at".into(),
            Value::String(format_timestamp(&self.created_at)),
        );
        row.insert(
            "updated_at".into(),
            Value::String(format_timestamp(&self.updated_at)),
        );
        for (key, value) in &self.fields {
            if !is_reserved(key) {
                row.insert(key.clone(), value.clone());
            }
        }
        Value::Object(row)
    }

    /// String value of a domain field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Month reference (`SET/25`) of the record, if any
    pub fn month_ref(&self) -> Option<&str> {
        self.get_str(MONTH_FIELD)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Fill in or normalize the month reference of month-bucketed tables.
    pub fn fill_month_ref(&mut self, table: TableName) {
        if !table.has_month() {
            return;
        }
        if let Some(existing) = self.month_ref() {
            let normalized = normalize_month_ref(existing);
            self.fields
                .insert(MONTH_FIELD.into(), Value::String(normalized));
            return;
        }
        let derived = table
            .date_field()
            .and_then(|field| self.get_str(field))
            .and_then(month_ref_from_date);
        if let Some(month_ref) = derived {
            self.fields.insert(MONTH_FIELD.into(), Value::String(month_ref));
        }
    }

    /// Merge a partial update into the domain fields and mark the record dirty.
    pub fn apply_patch(&mut self, patch: Fields) {
        for (key, value) in sanitize_fields(patch) {
            self.fields.insert(key, value);
        }
        self.touch();
    }

    /// Bump `updated_at` past its previous value and mark the record unsynced.
    pub fn touch(&mut self) {
        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = timestamp_now().max(floor);
        self.synced = false;
    }

    /// Whether the record is a pending create that never reached the remote
    pub const fn is_local_only(&self) -> bool {
        !self.on_remote
    }
}

/// Whether a key is managed by the sync layer
pub fn is_reserved(key: &str) -> bool {
    RESERVED_FIELDS.contains(&key)
}

/// Drop reserved keys from caller-supplied fields.
pub fn sanitize_fields(mut fields: Fields) -> Fields {
    fields.retain(|key, _| !is_reserved(key));
    fields
}
