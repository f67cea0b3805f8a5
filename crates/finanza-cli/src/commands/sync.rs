use finanza_core::Session;

use crate::cli::SyncCommands;
use crate::commands::common::{
    format_sync_conflict_lines, format_sync_failure_lines, open_session, sync_conflict_to_item,
    sync_failure_to_item, SessionOptions, SyncConflictItem, SyncFailureItem,
};
use crate::error::CliError;

pub async fn run_sync_command(
    command: Option<SyncCommands>,
    options: &SessionOptions,
) -> Result<(), CliError> {
    match command {
        None => run_sync(options).await,
        Some(SyncCommands::Conflicts { limit, json }) => {
            run_sync_conflicts(limit, json, options).await
        }
        Some(SyncCommands::Failures { json }) => run_sync_failures(json, options).await,
        Some(SyncCommands::Retry) => run_sync_retry(options).await,
    }
}

pub async fn run_sync(options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    run_sync_with(&session).await
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let conflicts = session.conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_failures(as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let failures = session.stuck_records().await?;

    if as_json {
        let json_items = failures
            .iter()
            .map(sync_failure_to_item)
            .collect::<Vec<SyncFailureItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if failures.is_empty() {
        println!("No records need attention.");
        return Ok(());
    }

    for line in format_sync_failure_lines(&failures) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_retry(options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let cleared = session.retry_stuck().await?;
    println!("Cleared {cleared} failure entr{}", if cleared == 1 { "y" } else { "ies" });

    if session.is_online() {
        run_sync_with(&session).await?;
    }
    Ok(())
}

async fn run_sync_with(session: &Session) -> Result<(), CliError> {
    let outcome = session.trigger_sync().await;
    if !outcome.success {
        return Err(CliError::Operation(outcome.message));
    }
    println!("{}", outcome.message);
    Ok(())
}
