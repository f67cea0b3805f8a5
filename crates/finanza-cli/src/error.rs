use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] finanza_core::Error),
    #[error(transparent)]
    Remote(#[from] finanza_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No fields provided; use -f key=value or --data '{{...}}'")]
    NoFields,
    #[error("Invalid field assignment '{0}'; expected key=value")]
    InvalidField(String),
    #[error("Invalid month '{0}'; expected MMM/YY, e.g. SET/25")]
    InvalidMonth(String),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Operation(String),
    #[error(
        "No user configured. Run `finanza config init --user-id <id>` or set FINANZA_USER_ID."
    )]
    UserNotConfigured,
}
