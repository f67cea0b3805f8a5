use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use finanza_core::TableName;

#[derive(Parser)]
#[command(name = "finanza")]
#[command(about = "Track income, expenses and debts offline, sync when connected")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote and user configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Skip the reachability check and work from the local cache only
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a record
    #[command(alias = "new")]
    Add {
        /// Target table
        #[arg(value_enum)]
        table: TableArg,
        /// Field assignment, e.g. `-f valor=120.5 -f descricao=Mercado`
        #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Fields as a JSON object (merged under explicit assignments)
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records of a table
    List {
        #[arg(value_enum)]
        table: TableArg,
        /// Month reference, e.g. SET/25
        #[arg(short, long, value_name = "MMM/YY")]
        month: Option<String>,
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing record
    #[command(alias = "edit")]
    Update {
        #[arg(value_enum)]
        table: TableArg,
        /// Record ID
        id: String,
        /// Field assignment, e.g. `-f status=pago`
        #[arg(short = 'f', long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Fields as a JSON object (merged under explicit assignments)
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// Delete a record
    Delete {
        #[arg(value_enum)]
        table: TableArg,
        /// Record ID
        id: String,
    },
    /// Push pending changes and pull remote data
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show connectivity and sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the local cache as a JSON backup
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import a JSON backup into the local cache
    Import {
        /// Backup file produced by `finanza export`
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Table names accepted on the command line
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TableArg {
    #[value(name = "receitas", alias = "income")]
    Receitas,
    #[value(name = "despesas", alias = "expenses")]
    Despesas,
    #[value(name = "dividas", alias = "debts")]
    Dividas,
    #[value(name = "saldos_bancarios", alias = "balances")]
    SaldosBancarios,
    #[value(name = "categorias", alias = "categories")]
    Categorias,
}

impl From<TableArg> for TableName {
    fn from(value: TableArg) -> Self {
        match value {
            TableArg::Receitas => Self::Income,
            TableArg::Despesas => Self::Expenses,
            TableArg::Dividas => Self::Debts,
            TableArg::SaldosBancarios => Self::BankBalances,
            TableArg::Categorias => Self::Categories,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records the remote keeps rejecting
    Failures {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear failure entries so quarantined records are retried
    Retry,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// User that owns the records
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
