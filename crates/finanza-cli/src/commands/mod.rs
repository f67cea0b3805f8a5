pub mod add;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod export;
pub mod import;
pub mod list;
pub mod status;
pub mod sync;
pub mod update;
