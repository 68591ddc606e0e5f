//! Unit tests for the checkpoint crate.

use std::cmp::Ordering;

use tempfile::TempDir;

use crate::{read_or_sentinel, CursorStore, FilesystemStore, MemoryStore, SyncCursor};

// ============================================================================
// SyncCursor Tests
// ============================================================================

#[test]
fn test_cursor_cli_string_roundtrip() {
    let cursor = SyncCursor::new("2024-05-01T10:00:00.000Z");
    let parsed = SyncCursor::from_cli_string(&cursor.to_cli_string()).unwrap();
    assert_eq!(parsed.position, cursor.position);
}

#[test]
fn test_cursor_from_cli_string_trims() {
    let cursor = SyncCursor::from_cli_string("  42 \n").unwrap();
    assert_eq!(cursor.position, "42");
}

#[test]
fn test_cursor_from_cli_string_rejects_empty() {
    let result = SyncCursor::from_cli_string("   ");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("must not be empty"));
}

#[test]
fn test_cursor_now_is_rfc3339_millis_utc() {
    let cursor = SyncCursor::now();
    assert!(cursor.position.ends_with('Z'));
    // 2024-01-01T00:00:00.000Z
    assert_eq!(cursor.position.len(), 24);
    assert!(chrono::DateTime::parse_from_rfc3339(&cursor.position).is_ok());
}

#[test]
fn test_cursor_integer_positions_compare_numerically() {
    let nine = SyncCursor::new("9");
    let ten = SyncCursor::new("10");
    assert_eq!(ten.cmp_position(&nine), Ordering::Greater);
}

#[test]
fn test_cursor_text_positions_compare_bytewise() {
    let earlier = SyncCursor::new("2024-01-01T00:00:00.000Z");
    let later = SyncCursor::new("2024-06-01T00:00:00.000Z");
    assert_eq!(later.cmp_position(&earlier), Ordering::Greater);
    assert_eq!(earlier.cmp_position(&later), Ordering::Less);
}

#[test]
fn test_cursor_integer_sorts_below_any_text() {
    let now = SyncCursor::new("2026-10-18T13:32:35.903Z");
    for position in ["1", "5", "42", "9999999"] {
        let integer = SyncCursor::new(position);
        assert_eq!(integer.cmp_position(&now), Ordering::Less, "{position}");
        assert_eq!(now.cmp_position(&integer), Ordering::Greater, "{position}");
    }
    assert_eq!(
        SyncCursor::new("5").advanced_to(now.clone()).position,
        now.position
    );
}

#[test]
fn test_cursor_empty_position_sorts_first() {
    let empty = SyncCursor::sentinel("");
    assert_eq!(empty.cmp_position(&SyncCursor::new("5")), Ordering::Less);
    assert_eq!(empty.cmp_position(&SyncCursor::new("-3")), Ordering::Less);
    assert_eq!(empty.cmp_position(&SyncCursor::new("a")), Ordering::Less);
    assert_eq!(empty.cmp_position(&SyncCursor::sentinel("")), Ordering::Equal);
    assert_eq!(empty.advanced_to(SyncCursor::new("5")).position, "5");
}

#[test]
fn test_cursor_advanced_to_never_moves_backwards() {
    let current = SyncCursor::new("2024-06-01T00:00:00.000Z");
    let older = SyncCursor::new("2024-01-01T00:00:00.000Z");
    let newer = SyncCursor::new("2024-07-01T00:00:00.000Z");

    assert_eq!(current.advanced_to(older).position, current.position);
    assert_eq!(current.advanced_to(newer.clone()).position, newer.position);
}

#[test]
fn test_sentinel_uses_epoch() {
    let sentinel = SyncCursor::sentinel("");
    assert_eq!(sentinel.position, "");
    assert_eq!(sentinel.updated_at.timestamp(), 0);
}

// ============================================================================
// FilesystemStore Tests
// ============================================================================

#[tokio::test]
async fn test_filesystem_store_missing_file_reads_none() {
    let tmp = TempDir::new().unwrap();
    let store = FilesystemStore::new(tmp.path().join("cursor.json"));
    assert!(store.read_cursor().await.unwrap().is_none());
}

#[tokio::test]
async fn test_filesystem_store_write_then_read() {
    let tmp = TempDir::new().unwrap();
    let store = FilesystemStore::new(tmp.path().join("nested").join("cursor.json"));

    let cursor = SyncCursor::new("2024-05-01T10:00:00.000Z");
    store.write_cursor(&cursor).await.unwrap();

    let loaded = store.read_cursor().await.unwrap().unwrap();
    assert_eq!(loaded, cursor);
}

#[tokio::test]
async fn test_filesystem_store_overwrites_previous_cursor() {
    let tmp = TempDir::new().unwrap();
    let store = FilesystemStore::new(tmp.path().join("cursor.json"));

    store.write_cursor(&SyncCursor::new("1")).await.unwrap();
    store.write_cursor(&SyncCursor::new("2")).await.unwrap();

    let loaded = store.read_cursor().await.unwrap().unwrap();
    assert_eq!(loaded.position, "2");

    // Only the cursor file remains, no leftover temp files
    let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_filesystem_store_corrupt_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cursor.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = FilesystemStore::new(&path);
    let result = store.read_cursor().await;
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("Failed to parse cursor file"));
}

// ============================================================================
// MemoryStore / read_or_sentinel Tests
// ============================================================================

#[tokio::test]
async fn test_read_or_sentinel_without_cursor() {
    let store = MemoryStore::new();
    let cursor = read_or_sentinel(&store, "bootstrap").await.unwrap();
    assert_eq!(cursor.position, "bootstrap");
    assert_eq!(store.reads(), 1);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_read_or_sentinel_prefers_stored_cursor() {
    let store = MemoryStore::with_cursor(SyncCursor::new("stored"));
    let cursor = read_or_sentinel(&store, "bootstrap").await.unwrap();
    assert_eq!(cursor.position, "stored");
}

#[tokio::test]
async fn test_memory_store_counts_writes() {
    let store = MemoryStore::new();
    store.write_cursor(&SyncCursor::new("a")).await.unwrap();
    store.write_cursor(&SyncCursor::new("b")).await.unwrap();

    assert_eq!(store.writes(), 2);
    assert_eq!(store.current().unwrap().position, "b");
}
