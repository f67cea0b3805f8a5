use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use finanza_core::models::{
    is_month_ref, is_reserved, normalize_month_ref, SyncConflict, SyncFailure,
};
use finanza_core::remote::{with_timeout, DisconnectedRemote, RemoteBackend, SupabaseRemote};
use finanza_core::{
    Fields, Record, RecordId, RemoteConfig, Session, SessionConfig, StoreBackend, SyncConfig,
};
use serde::Serialize;
use serde_json::Value;

use crate::config_profiles::{env_text, ProfileFile};
use crate::error::CliError;

/// Global flags shared by every command that opens a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub db_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub month: Option<String>,
    pub synced: bool,
    pub created_at: String,
    pub updated_at: String,
    pub fields: Fields,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub table: String,
    pub record_id: String,
    pub local_updated_at: String,
    pub remote_updated_at: String,
    pub winner: String,
    pub resolved_at: String,
}

#[derive(Debug, Serialize)]
pub struct SyncFailureItem {
    pub table: String,
    pub record_id: String,
    pub attempts: u32,
    pub last_error: String,
    pub next_attempt_at: String,
}

/// Open a session for the resolved profile.
///
/// Connectivity is checked once up front so commands start with an accurate
/// online state instead of reacting to a transition mid-command.
pub async fn open_session(options: &SessionOptions) -> Result<Session, CliError> {
    let file = ProfileFile::load().map_err(CliError::Config)?;
    let profile_name = file.resolve_name(options.profile.as_deref());
    let profile = file.effective(&profile_name);
    let user_id = profile.user_id.ok_or(CliError::UserNotConfigured)?;

    let sync = SyncConfig::default().without_auto_sync().without_ping();
    let remote = build_remote(profile.supabase_url, profile.supabase_anon_key, sync.call_timeout)?;
    let online = if options.offline {
        false
    } else {
        with_timeout(sync.call_timeout, remote.ping()).await.is_ok()
    };
    tracing::debug!(profile = %profile_name, online, "Opening session");

    let backend = resolve_store_backend(options.db_path.clone(), profile.db_path);
    let session_config = SessionConfig::new(user_id, backend).with_sync(sync);
    Ok(Session::open(session_config, remote, online).await)
}

/// Supabase when both URL and key are known, otherwise a backend that is
/// never reachable.
pub fn build_remote(
    url: Option<String>,
    anon_key: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn RemoteBackend>, CliError> {
    match (url, anon_key) {
        (Some(url), Some(anon_key)) => {
            let config =
                RemoteConfig::new(&url, anon_key)?.with_access_token(env_text("FINANZA_ACCESS_TOKEN"));
            Ok(Arc::new(SupabaseRemote::new(config, timeout)?))
        }
        _ => {
            tracing::debug!("Remote backend not configured; working offline");
            Ok(Arc::new(DisconnectedRemote))
        }
    }
}

/// `--db-path`, then the profile's cache file, then the platform data
/// directory.
pub fn resolve_store_backend(
    cli_db_path: Option<PathBuf>,
    profile_db_path: Option<PathBuf>,
) -> StoreBackend {
    cli_db_path
        .or(profile_db_path)
        .map_or_else(
            || StoreBackend::detect(dirs::data_dir().map(|dir| dir.join("finanza"))),
            StoreBackend::Sqlite,
        )
}

/// Build record fields from `--data` JSON and `key=value` assignments.
///
/// Assignment values are read as JSON when they parse (`120.5`, `true`,
/// `null`), otherwise as plain strings.
pub fn parse_fields(assignments: &[String], data: Option<&str>) -> Result<Fields, CliError> {
    let mut fields = match data {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => {
                return Err(CliError::Config(
                    "--data must be a JSON object".to_string(),
                ))
            }
        },
        None => Fields::new(),
    };

    for assignment in assignments {
        let (key, raw_value) = assignment
            .split_once('=')
            .ok_or_else(|| CliError::InvalidField(assignment.clone()))?;
        let key = key.trim();
        if key.is_empty() || is_reserved(key) {
            return Err(CliError::InvalidField(assignment.clone()));
        }
        let value = serde_json::from_str::<Value>(raw_value.trim())
            .unwrap_or_else(|_| Value::String(raw_value.to_string()));
        fields.insert(key.to_string(), value);
    }

    if fields.is_empty() {
        return Err(CliError::NoFields);
    }
    Ok(fields)
}

/// Validate a `--month` argument and return it in stored form (`SET/25`).
pub fn parse_month_arg(month: Option<&str>) -> Result<Option<String>, CliError> {
    match month {
        Some(month) if is_month_ref(month) => Ok(Some(normalize_month_ref(month))),
        Some(month) => Err(CliError::InvalidMonth(month.to_string())),
        None => Ok(None),
    }
}

pub fn normalize_record_id(id: &str) -> Result<RecordId, CliError> {
    id.parse::<RecordId>().map_err(|_| CliError::EmptyRecordId)
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    RecordListItem {
        id: record.id.to_string(),
        month: record.month_ref().map(str::to_string),
        synced: record.synced,
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
        fields: record.fields.clone(),
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let month = record.month_ref().unwrap_or("-");
            let marker = if record.synced { " " } else { "*" };
            format!(
                "{short_id:<13} {marker} {month:<7} {}",
                record_summary(record, 60)
            )
        })
        .collect()
}

/// Short `key=value` rendering of the most telling fields
pub fn record_summary(record: &Record, max_chars: usize) -> String {
    const PREFERRED: [&str; 5] = ["descricao", "nome", "banco", "valor", "saldo"];

    let mut parts = PREFERRED
        .iter()
        .filter_map(|key| record.fields.get(*key).map(|value| (*key, value)))
        .map(|(key, value)| format!("{key}={}", render_value(value)))
        .collect::<Vec<String>>();
    if parts.is_empty() {
        parts = record
            .fields
            .iter()
            .take(3)
            .map(|(key, value)| format!("{key}={}", render_value(value)))
            .collect();
    }

    let joined = parts.join(" ");
    if joined.chars().count() <= max_chars {
        joined
    } else {
        let mut truncated = joined
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        table: conflict.table.to_string(),
        record_id: conflict.record_id.to_string(),
        local_updated_at: conflict.local_updated_at.to_rfc3339(),
        remote_updated_at: conflict.remote_updated_at.to_rfc3339(),
        winner: conflict.winner.to_string(),
        resolved_at: conflict.resolved_at.to_rfc3339(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  {}/{}  local={} remote={}",
                format_sync_timestamp(&conflict.resolved_at),
                conflict.winner,
                conflict.table,
                conflict.record_id,
                format_sync_timestamp(&conflict.local_updated_at),
                format_sync_timestamp(&conflict.remote_updated_at)
            )
        })
        .collect()
}

pub fn sync_failure_to_item(failure: &SyncFailure) -> SyncFailureItem {
    SyncFailureItem {
        table: failure.table.to_string(),
        record_id: failure.record_id.to_string(),
        attempts: failure.attempts,
        last_error: failure.last_error.clone(),
        next_attempt_at: failure.next_attempt_at.to_rfc3339(),
    }
}

pub fn format_sync_failure_lines(failures: &[SyncFailure]) -> Vec<String> {
    failures
        .iter()
        .map(|failure| {
            format!(
                "{}/{}  attempts={}  {}",
                failure.table, failure.record_id, failure.attempts, failure.last_error
            )
        })
        .collect()
}

pub fn format_sync_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
