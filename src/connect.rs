//! Build the engine's collaborators from CLI options.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use checkpoint::{CursorStore, FilesystemStore};
use notion_sink::{NotionClient, NotionConfig};
use sqlite_notion_sync_sqlite_source::{
    SourceOpts, SqliteChangeSelector, SqliteClient, SqliteCursorStore,
};
use tracing::info;

use crate::{CursorOpts, CursorStorage, EngineSettings, NotionOpts, SyncEngine};

// Connect to the source SQLite database
pub async fn connect_sqlite(opts: &SourceOpts) -> Result<SqliteClient> {
    SqliteClient::connect(&opts.path)
        .await
        .with_context(|| format!("Failed to connect to SQLite at {}", opts.path.display()))
}

/// Open the configured cursor backend.
pub fn open_cursor_store(opts: &CursorOpts, client: &SqliteClient) -> Arc<dyn CursorStore> {
    let store: Arc<dyn CursorStore> = match opts.cursor_storage {
        CursorStorage::Sqlite => Arc::new(SqliteCursorStore::new(client.clone())),
        CursorStorage::Filesystem => Arc::new(FilesystemStore::new(opts.cursor_file.clone())),
    };
    info!("Using {} cursor storage", store.backend());
    store
}

pub fn build_notion_client(opts: &NotionOpts, timeout: Duration) -> Result<NotionClient> {
    NotionClient::new(NotionConfig {
        api_key: opts.notion_key.clone(),
        database_id: opts.notion_database_id.clone(),
        base_url: opts.notion_base_url.clone(),
        timeout,
    })
    .context("Failed to create Notion client")
}

/// Wire SQLite, the cursor store and Notion into a ready engine.
pub async fn build_engine(
    source: &SourceOpts,
    notion: &NotionOpts,
    cursor: &CursorOpts,
    settings: EngineSettings,
) -> Result<SyncEngine> {
    let client = connect_sqlite(source).await?;
    let cursor_store = open_cursor_store(cursor, &client);
    let selector = SqliteChangeSelector::new(client, &source.table, source.columns.clone())
        .context("Invalid source table configuration")?;
    let remote = build_notion_client(notion, settings.request_timeout)?;

    Ok(SyncEngine::new(
        cursor_store,
        Arc::new(selector),
        Arc::new(remote),
        settings,
    ))
}
