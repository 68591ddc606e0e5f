//! Change selection: rows strictly newer than the cursor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use checkpoint::SyncCursor;
use rusqlite::types::ValueRef;
use rusqlite::Row;
use sync_core::SourceRecord;
use tracing::debug;

use crate::schema::{quote, validate_identifier};
use crate::{ColumnMap, SqliteClient};

/// Source of change sets.
#[async_trait]
pub trait ChangeSelector: Send + Sync {
    /// Records whose ordering position is strictly greater than `cursor`, in
    /// the store's ordering. An empty vector means nothing is new.
    async fn select_since(&self, cursor: &SyncCursor) -> Result<Vec<SourceRecord>>;
}

/// ChangeSelector over one SQLite table.
pub struct SqliteChangeSelector {
    client: SqliteClient,
    table: String,
    columns: ColumnMap,
}

impl SqliteChangeSelector {
    pub fn new(client: SqliteClient, table: impl Into<String>, columns: ColumnMap) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        columns.validate()?;
        Ok(Self {
            client,
            table,
            columns,
        })
    }

    fn base_query(&self) -> String {
        let c = &self.columns;
        let body = c.body.as_deref().map(quote).unwrap_or_else(|| "NULL".to_string());
        format!(
            "SELECT {}, {}, {}, {}, {}, {} FROM {}",
            quote(&c.id),
            quote(&c.name),
            quote(&c.summary),
            quote(&c.locator),
            body,
            quote(&c.order),
            quote(&self.table),
        )
    }

    /// Empty position means the beginning of history: no predicate at all, so
    /// integer and text ordering columns behave the same.
    fn query_for(&self, cursor: &SyncCursor) -> (String, Option<String>) {
        let order = quote(&self.columns.order);
        if cursor.position.is_empty() {
            (format!("{} ORDER BY {order}", self.base_query()), None)
        } else {
            (
                format!("{} WHERE {order} > ?1 ORDER BY {order}", self.base_query()),
                Some(cursor.position.clone()),
            )
        }
    }
}

#[async_trait]
impl ChangeSelector for SqliteChangeSelector {
    async fn select_since(&self, cursor: &SyncCursor) -> Result<Vec<SourceRecord>> {
        let (sql, param) = self.query_for(cursor);
        debug!("Selecting changes: {sql} (cursor: '{}')", cursor.position);

        let table = self.table.clone();
        self.client
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&sql)
                    .with_context(|| format!("Failed to prepare selection on table '{table}'"))?;
                let rows = match &param {
                    Some(position) => stmt.query_map([position], row_to_record)?,
                    None => stmt.query_map([], row_to_record)?,
                };
                let records = rows
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .with_context(|| format!("Failed to read rows from table '{table}'"))?;
                Ok(records)
            })
            .await
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        id: text_at(row, 0)?.unwrap_or_default(),
        name: text_at(row, 1)?.unwrap_or_default(),
        summary: text_at(row, 2)?.unwrap_or_default(),
        locator: text_at(row, 3)?.unwrap_or_default(),
        body: text_at(row, 4)?.filter(|body| !body.is_empty()),
        position: text_at(row, 5)?.unwrap_or_default(),
    })
}

/// Render any SQLite value as text; NULL becomes `None`.
fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}
