//! Indexed page payload

use super::{Citation, ComponentId, DocumentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Characters of page text stored in the index payload
pub const INDEXED_CONTENT_CHARS: usize = 2000;

/// Metadata stored alongside each page vector.
///
/// Field names are the wire names used in the vector index payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub chunk_id: String,
    pub document_id: String,
    pub filename: String,

    /// 1-indexed page number
    pub page_number: u32,

    #[serde(default = "DocumentType::unknown", deserialize_with = "lenient_document_type")]
    pub document_type: DocumentType,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub component_ids: Vec<ComponentId>,

    #[serde(default)]
    pub image_path: Option<String>,

    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl ChunkPayload {
    /// `{document_id}_page_{n}`
    pub fn chunk_id_for(document_id: &str, page_number: u32) -> String {
        format!("{}_page_{}", document_id, page_number)
    }

    /// Stable positive 63-bit point id derived from the chunk id
    pub fn point_id(&self) -> u64 {
        let digest = Sha256::digest(self.chunk_id.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes) & 0x7FFF_FFFF_FFFF_FFFF
    }

    /// Build a citation from this payload with the given relevance
    pub fn to_citation(&self, score: f32, snippet_chars: usize) -> Citation {
        Citation {
            document_id: self.document_id.clone(),
            filename: self.filename.clone(),
            page_number: self.page_number,
            document_type: self.document_type.clone(),
            relevance_score: Citation::clamp_score(score),
            snippet: Some(truncate_chars(&self.content, snippet_chars)),
        }
    }
}

fn lenient_document_type<'de, D>(deserializer: D) -> std::result::Result<DocumentType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(DocumentType::from_indexed(raw.as_deref()))
}

/// First `max_chars` characters of `text`, never splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(content: &str) -> ChunkPayload {
        ChunkPayload {
            chunk_id: ChunkPayload::chunk_id_for("doc-1", 3),
            document_id: "doc-1".to_string(),
            filename: "press_line.pdf".to_string(),
            page_number: 3,
            document_type: DocumentType::new("electrical_schematic").unwrap(),
            content: content.to_string(),
            component_ids: vec![ComponentId::from_indexed("k102")],
            image_path: None,
            indexed_at: None,
        }
    }

    #[test]
    fn test_point_id_is_stable_and_positive() {
        let a = payload("x");
        let b = payload("y");
        assert_eq!(a.chunk_id, "doc-1_page_3");
        assert_eq!(a.point_id(), b.point_id());
        assert!(a.point_id() <= i64::MAX as u64);
    }

    #[test]
    fn test_truncate_chars_respects_utf8() {
        assert_eq!(truncate_chars("Ωmega", 1), "Ω");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_to_citation_truncates_snippet() {
        let long = "a".repeat(900);
        let citation = payload(&long).to_citation(1.7, 500);
        assert_eq!(citation.relevance_score, 1.0);
        assert_eq!(citation.snippet.as_deref().map(str::len), Some(500));
        assert_eq!(citation.page_number, 3);
    }

    #[test]
    fn test_missing_fields_default() {
        let raw = serde_json::json!({
            "chunk_id": "d_page_1",
            "document_id": "d",
            "filename": "f.pdf",
            "page_number": 1
        });
        let parsed: ChunkPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.document_type.as_str(), "unknown");
        assert!(parsed.component_ids.is_empty());
    }

    #[test]
    fn test_indexed_values_are_normalized() {
        let raw = serde_json::json!({
            "chunk_id": "d_page_2",
            "document_id": "d",
            "filename": "f.pdf",
            "page_number": 2,
            "document_type": "",
            "component_ids": ["k102", " x2:15 "]
        });
        let parsed: ChunkPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.document_type.as_str(), "unknown");
        assert_eq!(parsed.component_ids[0].as_str(), "K102");
        assert_eq!(parsed.component_ids[1].as_str(), "X2:15");
    }
}
