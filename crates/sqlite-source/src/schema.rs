//! Identifier validation and cursor table bootstrap.

use rusqlite::Connection;

/// Table and column names are interpolated into SQL, so they are restricted
/// to ASCII letters, digits and underscores and must not start with a digit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("SQL identifier must not be empty")]
    Empty,
    #[error("Invalid SQL identifier '{0}': only ASCII letters, digits and '_' are allowed, and it must not start with a digit")]
    Invalid(String),
}

pub fn validate_identifier(name: &str) -> Result<(), IdentifierError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(IdentifierError::Empty)?;
    let valid_first = first.is_ascii_alphabetic() || first == '_';
    if !valid_first || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(IdentifierError::Invalid(name.to_string()));
    }
    Ok(())
}

/// Quote a validated identifier.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

/// Create the single-row cursor table if it does not exist yet.
pub(crate) fn ensure_cursor_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_status (
            id INTEGER PRIMARY KEY,
            last_sync TIMESTAMP
        )",
    )
}
