//! Source and remote record types.
//!
//! A [`SourceRecord`] is read from the local store once per pass and never
//! mutated. [`RemoteRecord::from_source`] maps it onto the remote page shape:
//! a title property, rich-text properties and paragraph child blocks.

use serde::{Deserialize, Serialize};

/// Remote property holding the page title.
pub const TITLE_PROPERTY: &str = "name";
/// Remote rich-text property holding the summary.
pub const SUMMARY_PROPERTY: &str = "abstract";
/// Remote rich-text property holding the locator. Duplicate suppression
/// queries this property.
pub const LOCATOR_PROPERTY: &str = "file_path";

/// Longest text the remote API accepts in one rich-text segment.
pub const MAX_RICH_TEXT_LEN: usize = 2000;
/// Most rich-text segments accepted in one property or block.
pub const MAX_RICH_TEXT_SEGMENTS: usize = 100;
/// Most child blocks accepted in one page-create request.
pub const MAX_CHILD_BLOCKS: usize = 100;

/// Snapshot of one local row at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Row identifier
    pub id: String,
    /// Display name, becomes the page title
    pub name: String,
    /// Free-text summary
    pub summary: String,
    /// Path/locator string, the uniqueness key on the remote side
    pub locator: String,
    /// Optional long-form body content
    pub body: Option<String>,
    /// Ordering-column value as text; the cursor advances to this under the
    /// `delivered` advance policy
    pub position: String,
}

impl SourceRecord {
    /// Build a record whose ordering position is its identifier.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        summary: impl Into<String>,
        locator: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            position: id.clone(),
            id,
            name: name.into(),
            summary: summary.into(),
            locator: locator.into(),
            body: None,
        }
    }

    /// Attach long-form body content.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the ordering position.
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = position.into();
        self
    }
}

/// Value of one remote page property. Text is pre-split into segments of at
/// most [`MAX_RICH_TEXT_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Title(Vec<String>),
    RichText(Vec<String>),
}

/// Child content block of a remote page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentBlock {
    Paragraph(Vec<String>),
}

/// External representation created from a [`SourceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Identifier of the source row, kept for log context
    pub source_id: String,
    /// Locator of the source row, kept for log context
    pub locator: String,
    /// Page properties in a stable order
    pub properties: Vec<(String, PropertyValue)>,
    /// Page body
    pub children: Vec<ContentBlock>,
}

impl RemoteRecord {
    pub fn from_source(record: &SourceRecord) -> Self {
        let properties = vec![
            (
                TITLE_PROPERTY.to_string(),
                PropertyValue::Title(split_rich_text(&record.name)),
            ),
            (
                SUMMARY_PROPERTY.to_string(),
                PropertyValue::RichText(split_rich_text(&record.summary)),
            ),
            (
                LOCATOR_PROPERTY.to_string(),
                PropertyValue::RichText(split_rich_text(&record.locator)),
            ),
        ];

        let children = record
            .body
            .as_deref()
            .map(body_to_blocks)
            .unwrap_or_default();

        Self {
            source_id: record.id.clone(),
            locator: record.locator.clone(),
            properties,
            children,
        }
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Split text into segments of at most [`MAX_RICH_TEXT_LEN`] characters.
///
/// Empty text yields a single empty segment, matching how the remote side
/// stores a blank field. Text past [`MAX_RICH_TEXT_SEGMENTS`] segments is
/// dropped.
pub fn split_rich_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_RICH_TEXT_LEN)
        .take(MAX_RICH_TEXT_SEGMENTS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Paragraphs are separated by blank lines. Blank paragraphs are dropped and
/// the result is capped at [`MAX_CHILD_BLOCKS`].
fn body_to_blocks(body: &str) -> Vec<ContentBlock> {
    body.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .take(MAX_CHILD_BLOCKS)
        .map(|paragraph| ContentBlock::Paragraph(split_rich_text(paragraph)))
        .collect()
}
