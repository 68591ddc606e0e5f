//! The sync cursor watermark.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Watermark marking the last position known to be mirrored remotely.
///
/// `position` is compared against the source ordering column by the source
/// database, so it is kept as text. Integer positions compare numerically in
/// [`SyncCursor::cmp_position`] to match how SQLite compares a numeric column
/// against a text parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Text watermark (timestamp or ordering key)
    pub position: String,
    /// Timestamp when this cursor value was produced
    pub updated_at: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(position: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            updated_at: Utc::now(),
        }
    }

    /// Cursor used before the first successful pass.
    pub fn sentinel(position: &str) -> Self {
        Self {
            position: position.to_string(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Cursor at the current wall-clock time, RFC 3339 with millisecond
    /// precision and a `Z` suffix.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            position: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: now,
        }
    }

    /// Convert to CLI-friendly string format: the bare position.
    pub fn to_cli_string(&self) -> String {
        self.position.clone()
    }

    /// Parse from CLI string format.
    pub fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let position = s.trim();
        if position.is_empty() {
            anyhow::bail!("Invalid cursor: position must not be empty");
        }
        Ok(Self::new(position))
    }

    /// Order two positions the way SQLite orders the stored values.
    ///
    /// The empty position is the beginning of history and sorts first. Two
    /// integers compare numerically, an integer sorts below any text, and two
    /// texts compare byte-wise (SQLite's BINARY collation).
    pub fn cmp_position(&self, other: &SyncCursor) -> Ordering {
        compare_positions(&self.position, &other.position)
    }

    /// Pick the later of `self` and `candidate`, keeping `self` on ties.
    pub fn advanced_to(&self, candidate: SyncCursor) -> SyncCursor {
        match candidate.cmp_position(self) {
            Ordering::Greater => candidate,
            _ => self.clone(),
        }
    }
}

impl std::fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.position)
    }
}

fn compare_positions(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.as_bytes().cmp(b.as_bytes()),
    }
}
