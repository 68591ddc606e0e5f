//! Notion sink for sqlite-notion-sync
//!
//! Writes [`sync_core::RemoteRecord`]s as pages of a Notion database and
//! answers existence queries on the locator property.
//!
//! The engine only talks to the [`RemoteStore`] trait; [`NotionClient`] is the
//! production implementation.

mod client;
mod error;
mod payload;

pub use client::{NotionClient, NotionConfig, DEFAULT_BASE_URL, NOTION_VERSION};
pub use error::NotionError;
pub use payload::{locator_query_payload, page_payload};

use anyhow::Result;
use async_trait::async_trait;
use sync_core::RemoteRecord;

/// Remote hosted-database operations used by the sync engine.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create one remote record, returning its remote identifier.
    async fn create_record(&self, record: &RemoteRecord) -> Result<String>;

    /// Identifier of a remote record whose locator equals `locator`, if any.
    async fn find_by_locator(&self, locator: &str) -> Result<Option<String>>;
}
