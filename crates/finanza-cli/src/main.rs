//! Finanza CLI - Command-line interface for offline-first finance tracking
//!
//! Records are written to the local cache first and synced with the remote
//! backend whenever it is reachable.

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::SessionOptions;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync_command;
use crate::commands::update::run_update;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "finanza=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = SessionOptions {
        db_path: cli.db_path,
        profile: cli.profile,
        offline: cli.offline,
    };

    match cli.command {
        Some(Commands::Add {
            table,
            fields,
            data,
            json,
        }) => run_add(table.into(), &fields, data.as_deref(), json, &options).await?,
        Some(Commands::List {
            table,
            month,
            limit,
            json,
        }) => run_list(table.into(), month.as_deref(), limit, json, &options).await?,
        Some(Commands::Update {
            table,
            id,
            fields,
            data,
        }) => run_update(table.into(), &id, &fields, data.as_deref(), &options).await?,
        Some(Commands::Delete { table, id }) => run_delete(table.into(), &id, &options).await?,
        Some(Commands::Sync { command }) => run_sync_command(command, &options).await?,
        Some(Commands::Status { json }) => run_status(json, &options).await?,
        Some(Commands::Export { output }) => run_export(output.as_deref(), &options).await?,
        Some(Commands::Import { path, json }) => run_import(&path, json, &options).await?,
        Some(Commands::Config { command }) => run_config(command, &options)?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
