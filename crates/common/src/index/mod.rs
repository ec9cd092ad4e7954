//! Vector index abstraction
//!
//! The index is an external engine; the core consumes three operations:
//! - `upsert` of page vectors with their payload, and `delete_document`
//!   to drop a document's previous pages before re-indexing (ingestion side)
//! - `search`: ranked nearest-neighbour query with optional filters
//! - `scan`: unranked structured lookup, used for exact identifier matches

mod memory;
mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{ChunkPayload, ComponentId, DocumentType};
use async_trait::async_trait;
use std::sync::Arc;

/// A vector plus its payload, ready to be stored
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl IndexPoint {
    pub fn new(vector: Vec<f32>, payload: ChunkPayload) -> Self {
        Self {
            id: payload.point_id(),
            vector,
            payload,
        }
    }
}

/// Search hit as ranked by the index
#[derive(Debug, Clone)]
pub struct ScoredPayload {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Exact-match metadata filter. Each populated condition matches if the
/// payload field contains any of the listed values; conditions are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFilter {
    pub document_types: Option<Vec<DocumentType>>,
    pub component_ids: Option<Vec<ComponentId>>,
}

impl IndexFilter {
    pub fn component(component_id: &ComponentId) -> Self {
        Self {
            document_types: None,
            component_ids: Some(vec![component_id.clone()]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document_types.as_ref().map_or(true, Vec::is_empty)
            && self.component_ids.as_ref().map_or(true, Vec::is_empty)
    }

    /// Evaluate the filter against a payload
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        let type_ok = match &self.document_types {
            Some(types) if !types.is_empty() => types.contains(&payload.document_type),
            _ => true,
        };
        let component_ok = match &self.component_ids {
            Some(ids) if !ids.is_empty() => ids.iter().any(|id| payload.component_ids.contains(id)),
            _ => true,
        };
        type_ok && component_ok
    }
}

/// Trait for vector index backends
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace points
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()>;

    /// Remove every point belonging to `document_id`
    async fn delete_document(&self, document_id: &str) -> Result<()>;

    /// Nearest-neighbour search, best match first
    async fn search(
        &self,
        vector: &[f32],
        filter: &IndexFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPayload>>;

    /// Unranked structured lookup
    async fn scan(&self, filter: &IndexFilter, limit: usize) -> Result<Vec<ChunkPayload>>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Create a vector index based on configuration
pub fn create_index(config: &VectorStoreConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend.as_str() {
        "qdrant" => Ok(Arc::new(QdrantIndex::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        other => Err(AppError::Configuration {
            message: format!("unknown vector store backend '{}'", other),
        }),
    }
}
