//! In-process remote backend.
//!
//! Behaves like the hosted store (rows keyed by id, filters by user and
//! month) and lets callers cut connectivity, add latency, reject individual
//! records or drop write responses. Every call is recorded, including failed
//! ones.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{RemoteBackend, RemoteError, RemoteFilter, RemoteResult, RemoteRow};
use crate::models::{normalize_month_ref, Fields, RecordId, TableName, MONTH_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Select,
    Fetch,
    Insert,
    Upsert,
    Update,
    Delete,
    Ping,
}

impl RemoteOp {
    const fn is_write(self) -> bool {
        matches!(self, Self::Insert | Self::Upsert | Self::Update | Self::Delete)
    }
}

/// One call received by [`MemoryRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub table: Option<TableName>,
    pub id: Option<RecordId>,
}

#[derive(Debug)]
struct MemoryRemoteState {
    tables: HashMap<TableName, BTreeMap<String, RemoteRow>>,
    reachable: bool,
    latency: Duration,
    rejected: HashSet<String>,
    lose_responses: bool,
    calls: Vec<RemoteCall>,
}

#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<MemoryRemoteState>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryRemoteState {
                tables: HashMap::new(),
                reachable: true,
                latency: Duration::ZERO,
                rejected: HashSet::new(),
                lose_responses: false,
                calls: Vec::new(),
            }),
        }
    }

    /// Simulate losing or regaining the network
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Reject every write touching `id` with a 400 response
    pub fn reject_record(&self, id: &RecordId) {
        self.state.lock().rejected.insert(id.to_string());
    }

    pub fn accept_record(&self, id: &RecordId) {
        self.state.lock().rejected.remove(id.as_str());
    }

    /// Apply writes but answer them with a timeout, like a response lost
    /// after the server committed
    pub fn set_lose_responses(&self, lose: bool) {
        self.state.lock().lose_responses = lose;
    }

    /// Store a row directly, as if written by another device
    pub fn seed(&self, table: TableName, row: RemoteRow) {
        if let Some(id) = row_id(&row) {
            self.state
                .lock()
                .tables
                .entry(table)
                .or_default()
                .insert(id, row);
        }
    }

    pub fn row(&self, table: TableName, id: &RecordId) -> Option<RemoteRow> {
        self.state
            .lock()
            .tables
            .get(&table)
            .and_then(|rows| rows.get(id.as_str()).cloned())
    }

    pub fn rows(&self, table: TableName) -> Vec<RemoteRow> {
        self.state
            .lock()
            .tables
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    /// Calls that targeted one record
    pub fn calls_for(&self, id: &RecordId) -> Vec<RemoteCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.id.as_ref() == Some(id))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    async fn begin(
        &self,
        op: RemoteOp,
        table: Option<TableName>,
        id: Option<RecordId>,
    ) -> RemoteResult<()> {
        let latency = {
            let mut state = self.state.lock();
            state.calls.push(RemoteCall {
                op,
                table,
                id: id.clone(),
            });
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.lock();
        if !state.reachable {
            return Err(RemoteError::Unreachable("network is down".to_string()));
        }
        if let Some(id) = id.filter(|id| op.is_write() && state.rejected.contains(id.as_str())) {
            return Err(RemoteError::Api {
                status: 400,
                message: format!("row {id} rejected (400)"),
            });
        }
        Ok(())
    }
}

/// Answer for a write that was already applied
fn applied(state: &MemoryRemoteState) -> RemoteResult<()> {
    if state.lose_responses {
        Err(RemoteError::Timeout(state.latency))
    } else {
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemote {
    async fn select(&self, table: TableName, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRow>> {
        self.begin(RemoteOp::Select, Some(table), None).await?;
        let month_ref = filter
            .month_ref
            .as_deref()
            .filter(|_| table.has_month())
            .map(normalize_month_ref);

        let state = self.state.lock();
        let rows = state
            .tables
            .get(&table)
            .map(|rows| {
                rows.values()
                    .filter(|row| field_str(row, "user_id") == Some(filter.user_id.as_str()))
                    .filter(|row| {
                        month_ref.as_deref().map_or(true, |wanted| {
                            field_str(row, MONTH_FIELD).map(normalize_month_ref).as_deref()
                                == Some(wanted)
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn fetch(&self, table: TableName, id: &RecordId) -> RemoteResult<Option<RemoteRow>> {
        self.begin(RemoteOp::Fetch, Some(table), Some(id.clone()))
            .await?;
        Ok(self.row(table, id))
    }

    async fn insert(&self, table: TableName, row: &RemoteRow) -> RemoteResult<()> {
        let id = row_id(row)
            .ok_or_else(|| RemoteError::InvalidPayload("row has no id".to_string()))?;
        self.begin(RemoteOp::Insert, Some(table), Some(RecordId::from(id.as_str())))
            .await?;

        let mut state = self.state.lock();
        let rows = state.tables.entry(table).or_default();
        if rows.contains_key(&id) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("duplicate key value violates unique constraint: {id} (409)"),
            });
        }
        rows.insert(id, row.clone());
        applied(&state)
    }

    async fn upsert(&self, table: TableName, row: &RemoteRow) -> RemoteResult<()> {
        let id = row_id(row)
            .ok_or_else(|| RemoteError::InvalidPayload("row has no id".to_string()))?;
        self.begin(RemoteOp::Upsert, Some(table), Some(RecordId::from(id.as_str())))
            .await?;

        let mut state = self.state.lock();
        let rows = state.tables.entry(table).or_default();
        if let (Some(Value::Object(existing)), Some(incoming)) = (rows.get_mut(&id), row.as_object()) {
            for (key, value) in incoming {
                existing.insert(key.clone(), value.clone());
            }
        } else {
            rows.insert(id, row.clone());
        }
        applied(&state)
    }

    async fn update(&self, table: TableName, id: &RecordId, patch: &Fields) -> RemoteResult<()> {
        self.begin(RemoteOp::Update, Some(table), Some(id.clone()))
            .await?;

        let mut state = self.state.lock();
        if let Some(Value::Object(existing)) = state
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.get_mut(id.as_str()))
        {
            for (key, value) in patch {
                existing.insert(key.clone(), value.clone());
            }
        }
        applied(&state)
    }

    async fn delete(&self, table: TableName, id: &RecordId) -> RemoteResult<()> {
        self.begin(RemoteOp::Delete, Some(table), Some(id.clone()))
            .await?;

        let mut state = self.state.lock();
        if let Some(rows) = state.tables.get_mut(&table) {
            rows.remove(id.as_str());
        }
        applied(&state)
    }

    async fn ping(&self) -> RemoteResult<()> {
        self.begin(RemoteOp::Ping, None, None).await
    }
}

fn row_id(row: &RemoteRow) -> Option<String> {
    field_str(row, "id").map(ToString::to_string)
}

fn field_str<'a>(row: &'a RemoteRow, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread")]
    async fn select_filters_by_user_and_month() {
        let remote = MemoryRemote::new();
        remote.seed(
            TableName::Expenses,
            json!({"id": "a", "user_id": "u1", "mes_referencia": "JAN/25"}),
        );
        remote.seed(
            TableName::Expenses,
            json!({"id": "b", "user_id": "u1", "mes_referencia": "FEV/25"}),
        );
        remote.seed(
            TableName::Expenses,
            json!({"id": "c", "user_id": "u2", "mes_referencia": "JAN/25"}),
        );

        let all = remote
            .select(TableName::Expenses, &RemoteFilter::user("u1"))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let january = remote
            .select(
                TableName::Expenses,
                &RemoteFilter::user("u1").with_month(Some("jan/25".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0]["id"], json!("a"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_calls_are_recorded_and_fail() {
        let remote = MemoryRemote::new();
        remote.set_reachable(false);
        let id = RecordId::from("x");
        let result = remote.delete(TableName::Debts, &id).await;
        assert!(matches!(result, Err(RemoteError::Unreachable(_))));
        assert_eq!(remote.calls_for(&id).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_rejects_duplicates_but_upsert_merges() {
        let remote = MemoryRemote::new();
        let row = json!({"id": "a", "user_id": "u1", "valor": 1});
        remote.insert(TableName::Income, &row).await.unwrap();
        assert!(remote.insert(TableName::Income, &row).await.is_err());

        remote
            .upsert(TableName::Income, &json!({"id": "a", "valor": 2}))
            .await
            .unwrap();
        let stored = remote.row(TableName::Income, &RecordId::from("a")).unwrap();
        assert_eq!(stored["valor"], json!(2));
        assert_eq!(stored["user_id"], json!("u1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_records_fail_with_client_error() {
        let remote = MemoryRemote::new();
        let id = RecordId::from("bad");
        remote.reject_record(&id);
        let error = remote
            .upsert(TableName::Categories, &json!({"id": "bad"}))
            .await
            .unwrap_err();
        assert!(!error.is_transient());

        assert!(remote
            .fetch(TableName::Categories, &id)
            .await
            .unwrap()
            .is_none());

        remote.accept_record(&id);
        remote
            .upsert(TableName::Categories, &json!({"id": "bad"}))
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lost_responses_still_commit_the_write() {
        let remote = MemoryRemote::new();
        remote.set_lose_responses(true);
        let row = json!({"id": "a", "user_id": "u1"});
        let error = remote.insert(TableName::Income, &row).await.unwrap_err();
        assert!(error.may_have_applied());

        let stored = remote
            .fetch(TableName::Income, &RecordId::from("a"))
            .await
            .unwrap();
        assert_eq!(stored, Some(row));
    }
}
