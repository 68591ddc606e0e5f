//! Filesystem-based cursor storage implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::store::CursorStore;
use crate::SyncCursor;

/// Filesystem implementation of CursorStore trait.
///
/// Stores the cursor as one JSON file. Writes go to a temporary file in the
/// same directory which is then renamed over the target, so readers never
/// observe a half-written cursor.
pub struct FilesystemStore {
    path: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the cursor file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

#[async_trait]
impl CursorStore for FilesystemStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn read_cursor(&self) -> Result<Option<SyncCursor>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cursor file {}", self.path.display()))?;
        let cursor = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cursor file {}", self.path.display()))?;
        Ok(Some(cursor))
    }

    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(cursor)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).with_context(|| {
            format!("Failed to replace cursor file {}", self.path.display())
        })?;

        tracing::debug!(
            "Stored cursor {} to {}",
            cursor.to_cli_string(),
            self.path.display()
        );
        Ok(())
    }
}
