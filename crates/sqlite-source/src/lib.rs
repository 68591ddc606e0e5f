//! SQLite source for sqlite-notion-sync
//!
//! Selects rows newer than the sync cursor from a single source table and
//! stores the cursor itself in a one-row `sync_status` table of the same
//! database.
//!
//! All rusqlite calls run on the blocking thread pool; every public
//! operation is an awaitable future.

mod client;
mod cursor_store;
mod schema;
mod selector;

pub use client::SqliteClient;
pub use cursor_store::{SqliteCursorStore, CURSOR_ROW_ID};
pub use schema::{validate_identifier, IdentifierError};
pub use selector::{ChangeSelector, SqliteChangeSelector};

/// SQLite source connection options
#[derive(Clone, Debug)]
pub struct SourceOpts {
    /// Path to the SQLite database file
    pub path: std::path::PathBuf,
    /// Source table name
    pub table: String,
    /// Column layout of the source table
    pub columns: ColumnMap,
}

/// Names of the source table columns mapped onto a `SourceRecord`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub locator: String,
    /// Long-form body column; `None` when the table has no body
    pub body: Option<String>,
    /// Column compared against the cursor and used for ordering
    pub order: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            name: "name".to_string(),
            summary: "abstract".to_string(),
            locator: "file_path".to_string(),
            body: None,
            order: "id".to_string(),
        }
    }
}

impl ColumnMap {
    /// Check every configured column name is a plain SQL identifier.
    pub fn validate(&self) -> Result<(), IdentifierError> {
        for column in [
            &self.id,
            &self.name,
            &self.summary,
            &self.locator,
            &self.order,
        ] {
            validate_identifier(column)?;
        }
        if let Some(body) = &self.body {
            validate_identifier(body)?;
        }
        Ok(())
    }
}
