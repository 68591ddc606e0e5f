//! HTTP client for the Notion REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;
use sync_core::RemoteRecord;

use crate::error::NotionError;
use crate::payload::{locator_query_payload, page_payload};
use crate::RemoteStore;

/// Notion REST API root.
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
/// API version sent in the `Notion-Version` header.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Connection settings for [`NotionClient`].
#[derive(Clone)]
pub struct NotionConfig {
    /// Integration token
    pub api_key: String,
    /// Target database identifier
    pub database_id: String,
    /// API root, overridable for proxies and tests
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_key", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<PageRef>,
}

/// Notion implementation of [`RemoteStore`].
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            anyhow::bail!("Notion API key is empty");
        }
        if config.database_id.trim().is_empty() {
            anyhow::bail!("Notion database id is empty");
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .context("Notion API key contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, NotionError> {
        let url = self.url(path);
        tracing::trace!("POST {url}");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        Err(NotionError::from_response(status.as_u16(), retry_after, &body))
    }
}

#[async_trait]
impl RemoteStore for NotionClient {
    async fn create_record(&self, record: &RemoteRecord) -> Result<String> {
        let payload = page_payload(&self.config.database_id, record);
        let response = self.post("pages", &payload).await?;
        let page: PageRef = serde_json::from_value(response)
            .map_err(|e| NotionError::UnexpectedResponse(format!("page without id: {e}")))?;
        tracing::debug!(
            "Created Notion page {} for record {}",
            page.id,
            record.source_id
        );
        Ok(page.id)
    }

    async fn find_by_locator(&self, locator: &str) -> Result<Option<String>> {
        let path = format!("databases/{}/query", self.config.database_id);
        let response = self.post(&path, &locator_query_payload(locator)).await?;
        let query: QueryResponse = serde_json::from_value(response)
            .map_err(|e| NotionError::UnexpectedResponse(format!("malformed query result: {e}")))?;
        Ok(query.results.into_iter().next().map(|page| page.id))
    }
}
