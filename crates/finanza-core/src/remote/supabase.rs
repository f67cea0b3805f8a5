//! Supabase PostgREST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{RemoteBackend, RemoteError, RemoteFilter, RemoteResult, RemoteRow};
use crate::config::RemoteConfig;
use crate::models::{Fields, RecordId, TableName, MONTH_FIELD};
use crate::util::compact_text;

/// Talks to the `/rest/v1/{table}` endpoints of a Supabase project.
#[derive(Clone)]
pub struct SupabaseRemote {
    config: RemoteConfig,
    client: Client,
}

impl SupabaseRemote {
    pub fn new(config: RemoteConfig, request_timeout: Duration) -> RemoteResult<Self> {
        Ok(Self {
            config,
            client: Client::builder().timeout(request_timeout).build()?,
        })
    }

    fn table_url(&self, table: TableName) -> String {
        format!("{}/{}", self.config.rest_url, table.as_str())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.config.bearer_token())
            .header("Accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

#[async_trait]
impl RemoteBackend for SupabaseRemote {
    async fn select(&self, table: TableName, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRow>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", filter.user_id)),
        ];
        if let Some(month_ref) = filter.month_ref.as_ref().filter(|_| table.has_month()) {
            query.push((MONTH_FIELD, format!("eq.{month_ref}")));
        }

        let response = self
            .send(self.client.get(self.table_url(table)).query(&query))
            .await?;
        let rows = response
            .json::<Vec<RemoteRow>>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        tracing::debug!(table = %table, rows = rows.len(), "Fetched remote rows");
        Ok(rows)
    }

    async fn fetch(&self, table: TableName, id: &RecordId) -> RemoteResult<Option<RemoteRow>> {
        let query = [("select", "*".to_string()), ("id", format!("eq.{id}"))];
        let response = self
            .send(self.client.get(self.table_url(table)).query(&query))
            .await?;
        let rows = response
            .json::<Vec<RemoteRow>>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: TableName, row: &RemoteRow) -> RemoteResult<()> {
        self.send(
            self.client
                .post(self.table_url(table))
                .header("Prefer", "return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }

    async fn upsert(&self, table: TableName, row: &RemoteRow) -> RemoteResult<()> {
        self.send(
            self.client
                .post(self.table_url(table))
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, table: TableName, id: &RecordId, patch: &Fields) -> RemoteResult<()> {
        self.send(
            self.client
                .patch(self.table_url(table))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=minimal")
                .json(patch),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, table: TableName, id: &RecordId) -> RemoteResult<()> {
        self.send(
            self.client
                .delete(self.table_url(table))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=minimal"),
        )
        .await?;
        Ok(())
    }

    async fn ping(&self) -> RemoteResult<()> {
        // Any HTTP answer means the backend is reachable.
        self.authorized(self.client.head(format!("{}/", self.config.rest_url)))
            .send()
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return match payload.details.filter(|details| !details.trim().is_empty()) {
                Some(details) => format!(
                    "{}: {} ({})",
                    message.trim(),
                    compact_text(&details),
                    status.as_u16()
                ),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}
