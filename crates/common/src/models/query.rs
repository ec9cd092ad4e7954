//! Query input and response

use super::{Citation, ComponentId, DocumentType};
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Citations returned when the caller does not specify a limit
pub const DEFAULT_MAX_CITATIONS: usize = 5;

/// Immutable query input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub max_citations: usize,

    /// Optional restriction of semantic retrieval to these document types
    #[serde(default)]
    pub document_types: Option<Vec<DocumentType>>,
}

impl Query {
    pub fn new(text: impl Into<String>, max_citations: usize) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AppError::InvalidQuery {
                message: "query text must not be empty".to_string(),
            });
        }
        if max_citations == 0 {
            return Err(AppError::InvalidQuery {
                message: "max_citations must be at least 1".to_string(),
            });
        }
        Ok(Self {
            text,
            max_citations,
            document_types: None,
        })
    }

    pub fn with_document_types(mut self, types: Vec<DocumentType>) -> Self {
        self.document_types = if types.is_empty() { None } else { Some(types) };
        self
    }
}

/// Externally visible result of one query evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,

    /// At most the requested number of citations
    pub citations: Vec<Citation>,

    pub confidence: f32,

    /// Component identifiers found across document types
    pub cross_references: Vec<ComponentId>,

    pub grounded: bool,

    /// Generate/verify passes executed (1 + retries)
    pub attempts: u32,
}
