// ============================================================
// Layer 3 — TextRecord Domain Type
// ============================================================
// One input row after loading. For classification the labels
// hold the raw class names (several for multi-label rows);
// for generation corpora the labels are empty.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub text:   String,
    pub labels: Vec<String>,
}

impl TextRecord {
    pub fn new(text: impl Into<String>, labels: Vec<String>) -> Self {
        Self { text: text.into(), labels }
    }

    /// A record without labels, as read from a generation corpus.
    pub fn unlabelled(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn is_labelled(&self) -> bool {
        !self.labels.is_empty()
    }
}
