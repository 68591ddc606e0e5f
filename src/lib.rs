//! SqliteNotionSync Library
//!
//! Incrementally mirrors rows of a local SQLite table into a Notion database.
//!
//! # Features
//!
//! - Incremental synchronization: only rows newer than the stored cursor are selected
//! - Duplicate suppression: rows whose locator already exists remotely are skipped
//! - Rate-limited delivery: fixed-size concurrent batches separated by a delay
//! - Partial-failure tolerance: one rejected row never blocks the rest of a pass
//! - Recurring schedule: one pass at startup, then one per interval, never overlapping
//!
//! # Crates
//!
//! - `sync_core` - Source/remote record and outcome types
//! - `checkpoint` - Sync cursor and cursor storage backends
//! - `sqlite_notion_sync_sqlite_source` - SQLite change selection and cursor table
//! - `notion_sink` - Notion API client
//!
//! # CLI Usage
//!
//! ```bash
//! # Run as a daemon: one pass now, then every hour
//! sqlite-notion-sync run --sqlite-path downloads.db --interval 1h
//!
//! # One pass and exit
//! sqlite-notion-sync once --sqlite-path downloads.db --batch-size 10 --batch-delay 1s
//!
//! # Inspect or move the cursor
//! sqlite-notion-sync cursor show --sqlite-path downloads.db
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub mod config;
pub mod connect;
pub mod sync;
pub mod testing;

pub use sync::{
    AdvancePolicy, BatchDispatcher, DispatchReport, EngineSettings, Existence, ExistenceOracle,
    ExistencePolicy, PassOutcome, PassReport, Scheduler, SchedulerStats, SyncEngine, SyncState,
};

/// SQLite source options
#[derive(Parser, Clone, Debug)]
pub struct SqliteOpts {
    /// Path to the SQLite database file
    #[arg(long, env = "SQLITE_PATH")]
    pub sqlite_path: PathBuf,

    /// Source table to mirror
    #[arg(long, default_value = "downloads")]
    pub table: String,

    /// Column holding the row identifier
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Column holding the display name (page title)
    #[arg(long, default_value = "name")]
    pub name_column: String,

    /// Column holding the free-text summary
    #[arg(long, default_value = "abstract")]
    pub summary_column: String,

    /// Column holding the locator used for duplicate suppression
    #[arg(long, default_value = "file_path")]
    pub locator_column: String,

    /// Column holding long-form body content (optional)
    #[arg(long)]
    pub content_column: Option<String>,

    /// Column compared against the cursor ("strictly greater than")
    #[arg(long, default_value = "id")]
    pub order_column: String,
}

impl SqliteOpts {
    pub fn source_opts(&self) -> sqlite_notion_sync_sqlite_source::SourceOpts {
        sqlite_notion_sync_sqlite_source::SourceOpts {
            path: self.sqlite_path.clone(),
            table: self.table.clone(),
            columns: self.column_map(),
        }
    }

    pub fn column_map(&self) -> sqlite_notion_sync_sqlite_source::ColumnMap {
        sqlite_notion_sync_sqlite_source::ColumnMap {
            id: self.id_column.clone(),
            name: self.name_column.clone(),
            summary: self.summary_column.clone(),
            locator: self.locator_column.clone(),
            body: self.content_column.clone(),
            order: self.order_column.clone(),
        }
    }
}

/// Notion target options
#[derive(Parser, Clone)]
pub struct NotionOpts {
    /// Notion integration token
    #[arg(long, env = "NOTION_KEY", hide_env_values = true)]
    pub notion_key: String,

    /// Target Notion database id
    #[arg(long, env = "NOTION_DATABASE_ID")]
    pub notion_database_id: String,

    /// Notion API root
    #[arg(long, default_value = notion_sink::DEFAULT_BASE_URL, env = "NOTION_BASE_URL")]
    pub notion_base_url: String,
}

/// Where the sync cursor is stored
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorStorage {
    /// `sync_status` table in the source database
    Sqlite,
    /// JSON file at --cursor-file
    Filesystem,
}

/// Cursor storage options
#[derive(Parser, Clone, Debug)]
pub struct CursorOpts {
    /// Cursor storage backend
    #[arg(long, value_enum, default_value_t = CursorStorage::Sqlite)]
    pub cursor_storage: CursorStorage,

    /// Cursor file for filesystem storage
    #[arg(long, default_value = ".sqlite-notion-sync/cursor.json")]
    pub cursor_file: PathBuf,

    /// Position used before the first successful pass; empty selects every row
    #[arg(long, default_value = "")]
    pub bootstrap_position: String,
}

/// Sync pass options (non-connection related)
#[derive(Parser, Clone, Debug)]
pub struct SyncOpts {
    /// Records created concurrently per batch
    #[arg(long, default_value = "10")]
    pub batch_size: usize,

    /// Pause between batches to respect the remote rate limit
    /// Format: "1s", "500ms", "2m"
    #[arg(long, default_value = "1s")]
    pub batch_delay: String,

    /// Timeout for each remote call
    #[arg(long, default_value = "30s")]
    pub request_timeout: String,

    /// What a failed existence check means
    #[arg(long, value_enum, default_value_t = ExistencePolicy::FailOpen)]
    pub existence_policy: ExistencePolicy,

    /// Where the cursor moves after a pass
    #[arg(long, value_enum, default_value_t = AdvancePolicy::Now)]
    pub advance_policy: AdvancePolicy,

    /// Dry run mode - check existence but create nothing and keep the cursor
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncOpts {
    /// Validate and convert into engine settings.
    pub fn to_settings(&self, bootstrap_position: &str) -> anyhow::Result<EngineSettings> {
        if self.batch_size == 0 {
            anyhow::bail!("--batch-size must be at least 1");
        }
        Ok(EngineSettings {
            batch_size: self.batch_size,
            batch_delay: config::parse_duration(&self.batch_delay)?,
            request_timeout: config::parse_duration(&self.request_timeout)?,
            existence_policy: self.existence_policy,
            advance_policy: self.advance_policy,
            bootstrap_position: bootstrap_position.to_string(),
            dry_run: self.dry_run,
        })
    }
}
