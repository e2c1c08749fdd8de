use crate::config::Number;
use serde::{Deserialize, Serialize};

/// Shown in place of text when a returned id has no known text.
pub const MISSING_TEXT: &str = "N/A";

/// A vector as sent to the index insert endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<Number>,
}

/// Local side-table entry; the service does not keep text for us.
///
/// Files written by older tools carry only `text`; `index` then reads as 0.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetadataRecord {
    pub text: String,
    #[serde(default)]
    pub index: usize,
}

/// One hit as decoded from the service, before the local join.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub id: String,
    pub score: Option<Number>,
    pub metadata: Option<serde_json::Value>,
}

impl SearchMatch {
    /// Text carried inline by the service, if any.
    pub fn inline_text(&self) -> Option<&str> {
        let metadata = self.metadata.as_ref()?;
        ["text", "content", "original_text"]
            .iter()
            .find_map(|key| metadata.get(*key).and_then(|v| v.as_str()))
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: Option<Number>,
    pub text: String,
}

impl SearchResult {
    pub fn has_text(&self) -> bool {
        !self.text.is_empty() && self.text != MISSING_TEXT
    }
}
