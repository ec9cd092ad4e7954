//! Retrieval layer
//!
//! Two strategies over the same vector index:
//! - semantic search: embed the query, nearest-neighbour lookup, index ranking kept
//! - exact lookup: structured scan for pages listing a component identifier
//!
//! Infrastructure failures propagate unchanged; nothing is retried here.

mod cross_reference;

pub use cross_reference::{CrossReferenceResolution, CrossReferenceResolver};

use crate::embeddings::{Embedder, EmbeddingRole};
use crate::errors::Result;
use crate::index::{IndexFilter, VectorIndex};
use crate::models::{Citation, ComponentId, DocumentType, EXACT_MATCH_SCORE};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Client over the embedding provider and the vector index
pub struct RetrievalClient {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    snippet_chars: usize,
}

impl RetrievalClient {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        snippet_chars: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            snippet_chars,
        }
    }

    /// The underlying index, for readiness probes
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Semantic search, best match first.
    ///
    /// Each filter restricts results to pages whose metadata matches any of
    /// the given values. An empty embedding yields no results.
    #[instrument(skip(self, query_text, component_filter, type_filter), fields(index = self.index.name()))]
    pub async fn search(
        &self,
        query_text: &str,
        limit: usize,
        component_filter: Option<&[ComponentId]>,
        type_filter: Option<&[DocumentType]>,
    ) -> Result<Vec<Citation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query_text, EmbeddingRole::Query).await?;
        if vector.is_empty() {
            debug!("Query produced no embedding, skipping search");
            return Ok(Vec::new());
        }

        let filter = IndexFilter {
            document_types: type_filter.filter(|t| !t.is_empty()).map(<[_]>::to_vec),
            component_ids: component_filter.filter(|c| !c.is_empty()).map(<[_]>::to_vec),
        };

        let hits = self.index.search(&vector, &filter, limit).await?;
        debug!(hits = hits.len(), filtered = !filter.is_empty(), "Semantic search complete");

        Ok(hits
            .into_iter()
            .map(|hit| hit.payload.to_citation(hit.score, self.snippet_chars))
            .collect())
    }

    /// Exact structured lookup of pages listing `component_id`. Every
    /// citation carries the maximal relevance score.
    #[instrument(skip(self), fields(component = %component_id))]
    pub async fn lookup_by_component(
        &self,
        component_id: &ComponentId,
        limit: usize,
    ) -> Result<Vec<Citation>> {
        let payloads = self
            .index
            .scan(&IndexFilter::component(component_id), limit)
            .await?;
        debug!(hits = payloads.len(), "Component lookup complete");

        Ok(payloads
            .iter()
            .map(|payload| payload.to_citation(EXACT_MATCH_SCORE, self.snippet_chars))
            .collect())
    }
}
