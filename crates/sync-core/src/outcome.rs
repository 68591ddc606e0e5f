//! Delivery outcomes reported by the batch dispatcher.

use serde::{Deserialize, Serialize};

/// Result of delivering one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The remote side created a page with this id
    Delivered {
        source_id: String,
        locator: String,
        remote_id: String,
    },
    /// The create call was rejected or timed out
    Failed {
        source_id: String,
        locator: String,
        error: String,
    },
}

impl ItemOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ItemOutcome::Delivered { .. })
    }

    pub fn source_id(&self) -> &str {
        match self {
            ItemOutcome::Delivered { source_id, .. } | ItemOutcome::Failed { source_id, .. } => {
                source_id
            }
        }
    }

    pub fn locator(&self) -> &str {
        match self {
            ItemOutcome::Delivered { locator, .. } | ItemOutcome::Failed { locator, .. } => locator,
        }
    }
}

/// Outcomes of one chunk, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Zero-based chunk index within the pass
    pub index: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_delivered())
    }
}
