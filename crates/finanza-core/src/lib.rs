//! finanza-core - Core library for Finanza
//!
//! This crate contains the record models, the local cache, the sync engine
//! and the data access facade shared by every Finanza client. Writes land
//! in the local cache first and reach the remote backend when online.

pub mod backup;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod facade;
pub mod models;
pub mod remote;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, RetryPolicy, SessionConfig, StoreBackend, SyncConfig};
pub use connectivity::{ConnectivityMonitor, Subscription};
pub use error::{Error, Result};
pub use facade::{DataAccess, MutationOutcome, ReadQuery, WriteOutcome};
pub use models::{Fields, Record, RecordId, TableName};
pub use session::{Session, SyncOutcome, SyncStatus};
pub use state::SyncState;
pub use sync::{SyncEngine, SyncReport};
