//! Database migrations

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::TableName;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, &v1_statements())?;
    }
    if version < 2 {
        apply(conn, 2, &v2_statements())?;
    }
    if version < 3 {
        apply(conn, 3, &v3_statements())?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|value| value != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Run one migration atomically; the transaction rolls back on drop.
fn apply(conn: &mut Connection, version: i32, statements: &[String]) -> Result<()> {
    let tx = conn.transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Version 1: record tables and sync metadata
fn v1_statements() -> Vec<String> {
    let mut statements = vec![
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )"
        .to_string(),
        "CREATE TABLE IF NOT EXISTS sync_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )"
        .to_string(),
    ];

    for table in TableName::ALL {
        let name = table.as_str();
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                mes_referencia TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                deleted INTEGER NOT NULL DEFAULT 0,
                on_remote INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL DEFAULT '{{}}'
            )"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{name}_user ON {name}(user_id)"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{name}_synced ON {name}(synced)"
        ));
        if table.has_month() {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{name}_user_month ON {name}(user_id, mes_referencia)"
            ));
        }
    }

    statements
}

/// Version 2: last-writer-wins conflict log
fn v2_statements() -> Vec<String> {
    vec![
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name TEXT NOT NULL,
            record_id TEXT NOT NULL,
            local_updated_at TEXT NOT NULL,
            remote_updated_at TEXT NOT NULL,
            winner TEXT NOT NULL,
            resolved_at TEXT NOT NULL
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_record ON sync_conflicts(record_id)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)"
            .to_string(),
    ]
}

/// Version 3: per-record push failures for backoff and quarantine
fn v3_statements() -> Vec<String> {
    vec![
        "CREATE TABLE IF NOT EXISTS sync_failures (
            table_name TEXT NOT NULL,
            record_id TEXT NOT NULL,
            attempts INTEGER NOT NULL,
            last_error TEXT NOT NULL,
            last_attempt_at TEXT NOT NULL,
            next_attempt_at TEXT NOT NULL,
            PRIMARY KEY (table_name, record_id)
        )"
        .to_string(),
    ]
}
