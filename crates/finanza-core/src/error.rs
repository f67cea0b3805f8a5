//! Error types for finanza-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using finanza-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in finanza-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The local cache could not be opened on this device
    #[error("Local store unavailable: {0}")]
    StoreUnavailable(String),

    /// Remote backend error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
