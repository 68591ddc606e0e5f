//! Cursor storage in the source database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use checkpoint::{CursorStore, SyncCursor};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use crate::SqliteClient;

/// Key of the single row in `sync_status`.
pub const CURSOR_ROW_ID: i64 = 1;

/// CursorStore backed by the `sync_status` table.
///
/// The row is written with one upsert statement, which SQLite applies
/// atomically.
pub struct SqliteCursorStore {
    client: SqliteClient,
}

impl SqliteCursorStore {
    pub fn new(client: SqliteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn read_cursor(&self) -> Result<Option<SyncCursor>> {
        let position: Option<Option<String>> = self
            .client
            .call(|conn| {
                conn.query_row(
                    "SELECT CAST(last_sync AS TEXT) FROM sync_status WHERE id = ?1",
                    [CURSOR_ROW_ID],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to read sync cursor")
            })
            .await?;

        // A row holding NULL counts as never written.
        Ok(position.flatten().map(|position| {
            let updated_at = DateTime::parse_from_rfc3339(&position)
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            SyncCursor {
                position,
                updated_at,
            }
        }))
    }

    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        let position = cursor.position.clone();
        self.client
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sync_status (id, last_sync)
                     VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET last_sync = excluded.last_sync",
                    rusqlite::params![CURSOR_ROW_ID, position],
                )
                .context("Failed to write sync cursor")?;
                Ok(())
            })
            .await?;
        tracing::debug!("Stored cursor {} in sync_status", cursor.to_cli_string());
        Ok(())
    }
}
