//! Shared fixtures for unit tests: an in-memory corpus indexed with mock
//! embeddings

use crate::context::ComponentIdExtractor;
use crate::embeddings::{Embedder, EmbeddingRole, MockEmbedder};
use crate::index::{IndexPoint, InMemoryIndex, VectorIndex};
use crate::models::{ChunkPayload, DocumentType};
use crate::retrieval::RetrievalClient;
use std::sync::Arc;

pub(crate) const DIMENSION: usize = 64;

pub(crate) struct Page {
    document_id: &'static str,
    filename: &'static str,
    page_number: u32,
    document_type: &'static str,
    text: &'static str,
}

impl Page {
    pub(crate) fn new(
        document_id: &'static str,
        filename: &'static str,
        page_number: u32,
        document_type: &'static str,
        text: &'static str,
    ) -> Self {
        Self {
            document_id,
            filename,
            page_number,
            document_type,
            text,
        }
    }
}

pub(crate) struct Fixture {
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub retrieval: Arc<RetrievalClient>,
}

/// Index `pages` the way ingestion does and wire a retrieval client over them
pub(crate) async fn fixture(pages: &[Page]) -> Fixture {
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(DIMENSION));
    let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());
    let extractor = ComponentIdExtractor::new();

    let mut points = Vec::new();
    for page in pages {
        let vector = embedder.embed(page.text, EmbeddingRole::Document).await.unwrap();
        let payload = ChunkPayload {
            chunk_id: ChunkPayload::chunk_id_for(page.document_id, page.page_number),
            document_id: page.document_id.to_string(),
            filename: page.filename.to_string(),
            page_number: page.page_number,
            document_type: DocumentType::new(page.document_type).unwrap(),
            content: page.text.to_string(),
            component_ids: extractor.extract(page.text).into_iter().collect(),
            image_path: None,
            indexed_at: None,
        };
        points.push(IndexPoint::new(vector, payload));
    }
    index.upsert(points).await.unwrap();

    let retrieval = Arc::new(RetrievalClient::new(embedder.clone(), index.clone(), 500));
    Fixture {
        embedder,
        index,
        retrieval,
    }
}
