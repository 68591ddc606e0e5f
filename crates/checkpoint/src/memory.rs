//! In-memory cursor storage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::store::CursorStore;
use crate::SyncCursor;

/// CursorStore that keeps the cursor in process memory.
///
/// Counts reads and writes so callers can assert how a pass touched the
/// cursor.
#[derive(Default)]
pub struct MemoryStore {
    cursor: Mutex<Option<SyncCursor>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `cursor`.
    pub fn with_cursor(cursor: SyncCursor) -> Self {
        Self {
            cursor: Mutex::new(Some(cursor)),
            ..Self::default()
        }
    }

    /// Current cursor without counting a read.
    pub fn current(&self) -> Option<SyncCursor> {
        self.cursor.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read_cursor(&self) -> Result<Option<SyncCursor>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let guard = self
            .cursor
            .lock()
            .map_err(|_| anyhow!("Memory cursor lock poisoned"))?;
        Ok(guard.clone())
    }

    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        let mut guard = self
            .cursor
            .lock()
            .map_err(|_| anyhow!("Memory cursor lock poisoned"))?;
        *guard = Some(cursor.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
