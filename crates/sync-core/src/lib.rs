//! Core types for the sqlite-notion-sync framework.
//!
//! This crate provides the foundational types shared by the source, sink
//! and engine crates:
//!
//! - [`SourceRecord`] - Immutable snapshot of one local row selected for a pass
//! - [`RemoteRecord`] - The remote page representation built from a source record
//! - [`ItemOutcome`] / [`BatchResult`] - Per-item delivery results of one chunk
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── sqlite-source   (produces SourceRecord)
//!    ├─── notion-sink     (consumes RemoteRecord)
//!    └─── sqlite-notion-sync engine (produces BatchResult)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{RemoteRecord, SourceRecord};
//!
//! let source = SourceRecord::new("42", "Talk", "A short talk", "/videos/talk.mp4");
//! let remote = RemoteRecord::from_source(&source);
//! assert_eq!(remote.locator, "/videos/talk.mp4");
//! ```

pub mod outcome;
pub mod record;

pub use outcome::{BatchResult, ItemOutcome};
pub use record::{
    split_rich_text, ContentBlock, PropertyValue, RemoteRecord, SourceRecord, LOCATOR_PROPERTY,
    MAX_CHILD_BLOCKS, MAX_RICH_TEXT_LEN, MAX_RICH_TEXT_SEGMENTS, SUMMARY_PROPERTY,
    TITLE_PROPERTY,
};
