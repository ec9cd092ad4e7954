//! Citations and cross-reference maps

use super::{ComponentId, DocumentType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score carried by exact-match (identifier lookup) citations
pub const EXACT_MATCH_SCORE: f32 = 1.0;

/// One retrieved piece of evidence: a document page and a snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    pub filename: String,
    pub page_number: u32,
    pub document_type: DocumentType,

    /// Relevance in [0, 1]
    pub relevance_score: f32,

    /// Truncated page text
    pub snippet: Option<String>,
}

impl Citation {
    /// Clamp a raw similarity into [0, 1]. Cosine scores can be negative
    /// and NaN never leaves this function.
    pub fn clamp_score(raw: f32) -> f32 {
        if raw.is_nan() {
            0.0
        } else {
            raw.clamp(0.0, 1.0)
        }
    }
}

/// ComponentId -> document type -> citations, each list in the order the
/// retrieval layer returned it
pub type CrossReferenceMap = BTreeMap<ComponentId, BTreeMap<DocumentType, Vec<Citation>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(Citation::clamp_score(-0.2), 0.0);
        assert_eq!(Citation::clamp_score(1.3), 1.0);
        assert_eq!(Citation::clamp_score(0.42), 0.42);
        assert_eq!(Citation::clamp_score(f32::NAN), 0.0);
    }
}
