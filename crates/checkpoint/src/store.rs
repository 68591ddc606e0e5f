//! Cursor storage trait
//!
//! This module defines the CursorStore trait for backend-agnostic cursor
//! storage operations.

use anyhow::Result;
use async_trait::async_trait;

use crate::SyncCursor;

/// Trait for cursor storage operations.
///
/// This trait abstracts the storage backend for the sync cursor, allowing the
/// same engine to work with:
/// - Filesystem storage (`FilesystemStore`)
/// - In-memory storage (`MemoryStore`)
/// - The source SQLite database (`SqliteCursorStore` in sqlite-source crate)
///
/// Implementations must make `write_cursor` atomic: a concurrent or later
/// `read_cursor` sees either the previous cursor or the new one, never a mix.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Short backend name for log lines.
    fn backend(&self) -> &'static str;

    /// Read the cursor from the storage backend.
    ///
    /// Returns None if no cursor has been written yet.
    async fn read_cursor(&self) -> Result<Option<SyncCursor>>;

    /// Replace the stored cursor.
    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()>;
}
