//! Backend used when no remote is configured: every call fails.

use async_trait::async_trait;

use super::{RemoteBackend, RemoteError, RemoteFilter, RemoteResult, RemoteRow};
use crate::models::{Fields, RecordId, TableName};

#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedRemote;

#[async_trait]
impl RemoteBackend for DisconnectedRemote {
    async fn select(&self, _table: TableName, _filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRow>> {
        Err(RemoteError::NotConfigured)
    }

    async fn fetch(&self, _table: TableName, _id: &RecordId) -> RemoteResult<Option<RemoteRow>> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert(&self, _table: TableName, _row: &RemoteRow) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn upsert(&self, _table: TableName, _row: &RemoteRow) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn update(&self, _table: TableName, _id: &RecordId, _patch: &Fields) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete(&self, _table: TableName, _id: &RecordId) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn ping(&self) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }
}
