//! Shared SQLite connection handle.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::schema::ensure_cursor_table;

/// Handle to the source database.
///
/// Cloning is cheap; clones share one connection. The engine only reads
/// source rows through it, the cursor store is the single writer.
#[derive(Clone)]
pub struct SqliteClient {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteClient {
    /// Open an existing database file and bootstrap the cursor table.
    ///
    /// A missing file is an error rather than a fresh empty database.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let shown = path.display().to_string();

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("Failed to open SQLite database '{}'", path.display()))?;
            ensure_cursor_table(&conn).context("Failed to create sync_status table")?;
            Ok(conn)
        })
        .await
        .context("SQLite connect task panicked")??;

        info!("Connected to SQLite database {shown}");
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already-open connection, e.g. an in-memory database in tests.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Bootstrap the cursor table on a wrapped connection.
    pub async fn ensure_cursor_table(&self) -> Result<()> {
        self.call(|conn| ensure_cursor_table(conn).map_err(Into::into))
            .await
    }

    /// Run `f` against the connection on the blocking thread pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("SQLite connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .context("SQLite task panicked")?
    }
}
