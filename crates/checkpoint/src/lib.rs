//! Sync cursor management for sqlite-notion-sync
//!
//! Provides the [`SyncCursor`] watermark and the storage-agnostic
//! [`CursorStore`] trait used by the sync engine.
//!
//! # Architecture
//!
//! A cursor marks "everything up to and including this position has been
//! mirrored remotely". Exactly one cursor exists per sync target and it is
//! only written by the engine after a pass has dispatched its change set.
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - Stores the cursor as a single JSON file, replaced atomically
//! - `MemoryStore` - Keeps the cursor in process memory (tests, dry runs)
//! - `SqliteCursorStore` - Stores the cursor in the source database (in the sqlite-source crate)

mod cursor;
mod filesystem;
mod memory;
pub mod store;

#[cfg(test)]
mod tests;

pub use cursor::SyncCursor;
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use store::CursorStore;

/// Read the stored cursor, falling back to `sentinel` when none has been
/// written yet.
///
/// # Errors
/// * Returns the backend error unchanged; callers abort the pass on it.
pub async fn read_or_sentinel(
    store: &dyn CursorStore,
    sentinel: &str,
) -> anyhow::Result<SyncCursor> {
    match store.read_cursor().await? {
        Some(cursor) => Ok(cursor),
        None => {
            tracing::debug!(
                "No cursor stored in {} backend, starting from sentinel '{sentinel}'",
                store.backend()
            );
            Ok(SyncCursor::sentinel(sentinel))
        }
    }
}
