use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use finanza_core::remote::RemoteError;
use finanza_core::{Record, StoreBackend, TableName};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::{Cli, Commands, CompletionShell, SyncCommands, TableArg};
use crate::commands::common::{
    build_remote, format_record_lines, normalize_record_id, parse_fields, parse_month_arg,
    record_summary, resolve_store_backend,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{apply_profile_values, ProfileValues};
use crate::config_profiles::ProfileFile;
use crate::error::CliError;

#[test]
fn parse_fields_reads_json_values_and_plain_strings() {
    let fields = parse_fields(
        &[
            "valor=120.5".to_string(),
            "descricao=Conta de luz".to_string(),
            "pago=true".to_string(),
        ],
        None,
    )
    .unwrap();
    assert_eq!(fields["valor"], json!(120.5));
    assert_eq!(fields["descricao"], json!("Conta de luz"));
    assert_eq!(fields["pago"], json!(true));
}

#[test]
fn parse_fields_lets_assignments_override_data() {
    let fields = parse_fields(
        &["valor=10".to_string()],
        Some(r#"{"valor": 5, "descricao": "Cafe"}"#),
    )
    .unwrap();
    assert_eq!(fields["valor"], json!(10));
    assert_eq!(fields["descricao"], json!("Cafe"));
}

#[test]
fn parse_fields_rejects_bad_input() {
    assert!(matches!(
        parse_fields(&["sem-igual".to_string()], None),
        Err(CliError::InvalidField(_))
    ));
    assert!(matches!(
        parse_fields(&["updated_at=2020-01-01".to_string()], None),
        Err(CliError::InvalidField(_))
    ));
    assert!(matches!(parse_fields(&[], None), Err(CliError::NoFields)));
    assert!(parse_fields(&[], Some("[1]")).is_err());
}

#[test]
fn normalize_record_id_rejects_blank() {
    assert!(matches!(
        normalize_record_id("  "),
        Err(CliError::EmptyRecordId)
    ));
    assert_eq!(normalize_record_id(" abc ").unwrap().as_str(), "abc");
}

#[test]
fn table_args_map_to_remote_tables() {
    assert_eq!(TableName::from(TableArg::Receitas), TableName::Income);
    assert_eq!(
        TableName::from(TableArg::SaldosBancarios),
        TableName::BankBalances
    );
}

#[test]
fn cli_parses_add_with_field_assignments() {
    let cli = Cli::try_parse_from([
        "finanza",
        "--offline",
        "add",
        "despesas",
        "-f",
        "valor=50",
        "-f",
        "data_pagamento=2025-09-01",
    ])
    .unwrap();
    assert!(cli.offline);
    match cli.command {
        Some(Commands::Add { table, fields, .. }) => {
            assert_eq!(table, TableArg::Despesas);
            assert_eq!(fields.len(), 2);
        }
        _ => panic!("expected add command"),
    }
}

#[test]
fn cli_accepts_english_table_aliases_and_sync_subcommands() {
    let cli = Cli::try_parse_from(["finanza", "list", "expenses", "--month", "set/25"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::List {
            table: TableArg::Despesas,
            ..
        })
    ));

    let cli = Cli::try_parse_from(["finanza", "sync", "conflicts", "--limit", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: Some(SyncCommands::Conflicts { limit: 3, .. })
        })
    ));
}

#[test]
fn record_lines_mark_pending_records() {
    let fields = json!({"descricao": "Aluguel", "valor": 2500, "mes_referencia": "JAN/25"});
    let record = Record::new("u1", fields.as_object().cloned().unwrap());
    let lines = format_record_lines(&[record]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" * JAN/25"));
    assert!(lines[0].contains("descricao=Aluguel valor=2500"));
}

#[test]
fn record_summary_truncates_long_values() {
    let fields = json!({"descricao": "x".repeat(100)});
    let record = Record::new("u1", fields.as_object().cloned().unwrap());
    let summary = record_summary(&record, 20);
    assert_eq!(summary.chars().count(), 20);
    assert!(summary.ends_with("..."));
}

#[test]
fn db_path_flag_overrides_profile_cache() {
    let flag = PathBuf::from("/tmp/finanza-flag.db");
    let profile = PathBuf::from("/tmp/finanza-profile.db");
    assert_eq!(
        resolve_store_backend(Some(flag.clone()), Some(profile.clone())),
        StoreBackend::Sqlite(flag)
    );
    assert_eq!(
        resolve_store_backend(None, Some(profile.clone())),
        StoreBackend::Sqlite(profile)
    );
}

#[test]
fn month_argument_is_validated_and_normalized() {
    assert_eq!(parse_month_arg(Some("set/25")).unwrap().as_deref(), Some("SET/25"));
    assert_eq!(parse_month_arg(None).unwrap(), None);
    assert!(matches!(
        parse_month_arg(Some("2025-09")),
        Err(CliError::InvalidMonth(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_remote_config_yields_disconnected_backend() {
    let remote = build_remote(None, Some("key".to_string()), Duration::from_secs(1)).unwrap();
    assert!(matches!(
        remote.ping().await,
        Err(RemoteError::NotConfigured)
    ));
}

#[test]
fn apply_profile_values_activates_and_validates() {
    let mut file = ProfileFile {
        active_profile: None,
        profiles: BTreeMap::new(),
    };
    let name = apply_profile_values(
        &mut file,
        Some("casa"),
        ProfileValues {
            supabase_url: Some("https://abc.supabase.co/".to_string()),
            supabase_anon_key: Some(" anon ".to_string()),
            user_id: Some("user-1".to_string()),
            db_path: Some(PathBuf::from("/tmp/casa.db")),
        },
        false,
    )
    .unwrap();
    assert_eq!(name, "casa");
    assert_eq!(file.active_profile.as_deref(), Some("casa"));
    let profile = &file.profiles["casa"];
    assert_eq!(profile.supabase_url.as_deref(), Some("https://abc.supabase.co"));
    assert_eq!(profile.supabase_anon_key.as_deref(), Some("anon"));
    assert_eq!(profile.db_path, Some(PathBuf::from("/tmp/casa.db")));

    let invalid = apply_profile_values(
        &mut file,
        Some("casa"),
        ProfileValues {
            supabase_url: Some("abc.supabase.co".to_string()),
            ..ProfileValues::default()
        },
        true,
    );
    assert!(matches!(invalid, Err(CliError::Config(_))));
    assert_eq!(
        file.profiles["casa"].supabase_url.as_deref(),
        Some("https://abc.supabase.co")
    );
}

#[test]
fn completions_are_generated_for_every_shell() {
    for shell in [CompletionShell::Bash, CompletionShell::Zsh, CompletionShell::Fish] {
        let script = String::from_utf8(render_completions(shell)).unwrap();
        assert!(script.contains("finanza"));
    }
}
