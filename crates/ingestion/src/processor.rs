//! Ingestion processor
//!
//! Turns manifest pages into index points: component extraction, document
//! embedding with bounded concurrency, batched upserts.

use crate::errors::IngestionError;
use crate::manifest::{DocumentManifest, PageInput};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use mandolin_common::config::IngestionConfig;
use mandolin_common::context::ComponentIdExtractor;
use mandolin_common::embeddings::{Embedder, EmbeddingRole};
use mandolin_common::index::{IndexPoint, VectorIndex};
use mandolin_common::metrics;
use mandolin_common::models::{truncate_chars, ChunkPayload, ComponentId, INDEXED_CONTENT_CHARS};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Outcome of indexing one document
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub document_id: String,
    pub filename: String,
    pub pages_seen: usize,
    pub pages_indexed: usize,
    /// Pages without text, hence without an embedding
    pub pages_skipped: usize,
    pub component_ids: BTreeSet<ComponentId>,
}

/// Indexes manifests into the vector store
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    extractor: ComponentIdExtractor,
    config: IngestionConfig,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            extractor: ComponentIdExtractor::new(),
            config,
        }
    }

    /// Index every page of one document
    #[instrument(skip(self, manifest), fields(filename = %manifest.filename, pages = manifest.pages.len()))]
    pub async fn index_document(
        &self,
        manifest: DocumentManifest,
    ) -> Result<IngestionReport, IngestionError> {
        manifest.validate()?;

        let document_id = manifest
            .document_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let pages_seen = manifest.pages.len();

        let embedded: Vec<Result<Option<IndexPoint>, IngestionError>> = stream::iter(manifest.pages.iter())
            .map(|page| self.build_point(&document_id, &manifest, page))
            .buffered(self.config.embed_concurrency.max(1))
            .collect()
            .await;

        let mut points = Vec::with_capacity(pages_seen);
        for result in embedded {
            if let Some(point) = result? {
                points.push(point);
            }
        }

        let component_ids: BTreeSet<ComponentId> = points
            .iter()
            .flat_map(|p| p.payload.component_ids.iter().cloned())
            .collect();
        let pages_indexed = points.len();

        // Pages dropped from a newer version must not stay searchable
        self.index.delete_document(&document_id).await?;
        for batch in points.chunks(self.config.upsert_batch_size.max(1)) {
            self.index.upsert(batch.to_vec()).await?;
            debug!(batch = batch.len(), "Batch upserted");
        }

        metrics::record_pages_indexed(pages_indexed, manifest.document_type.as_str());
        info!(
            document_id = %document_id,
            indexed = pages_indexed,
            skipped = pages_seen - pages_indexed,
            components = component_ids.len(),
            "Document indexed"
        );

        Ok(IngestionReport {
            document_id,
            filename: manifest.filename,
            pages_seen,
            pages_indexed,
            pages_skipped: pages_seen - pages_indexed,
            component_ids,
        })
    }

    /// Embed one page; `None` when it has no text
    async fn build_point(
        &self,
        document_id: &str,
        manifest: &DocumentManifest,
        page: &PageInput,
    ) -> Result<Option<IndexPoint>, IngestionError> {
        let vector = self.embedder.embed(&page.text, EmbeddingRole::Document).await?;
        if vector.is_empty() {
            debug!(page = page.page_number, "Page has no text, skipping");
            return Ok(None);
        }

        let payload = ChunkPayload {
            chunk_id: ChunkPayload::chunk_id_for(document_id, page.page_number),
            document_id: document_id.to_string(),
            filename: manifest.filename.clone(),
            page_number: page.page_number,
            document_type: manifest.document_type.clone(),
            content: truncate_chars(&page.text, INDEXED_CONTENT_CHARS),
            component_ids: self.extractor.extract(&page.text).into_iter().collect(),
            image_path: page.image_path.clone(),
            indexed_at: Some(Utc::now()),
        };

        Ok(Some(IndexPoint::new(vector, payload)))
    }

    /// Load and index a manifest file
    pub async fn index_file(&self, path: &Path) -> Result<IngestionReport, IngestionError> {
        let manifest = DocumentManifest::load(path).await?;
        self.index_document(manifest).await
    }

    /// Index every `*.json` manifest in a directory. Failures are logged and
    /// the remaining manifests still run.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn index_directory(&self, dir: &Path) -> Result<Vec<IngestionReport>, IngestionError> {
        info!("Processing directory of manifests");

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut reports = Vec::new();
        for path in paths {
            match self.index_file(&path).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(
                        path = %path.display(),
                        error = %e,
                        "Failed to index manifest"
                    );
                }
            }
        }

        info!(total = reports.len(), "Directory processing complete");
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mandolin_common::embeddings::MockEmbedder;
    use mandolin_common::index::{IndexFilter, InMemoryIndex};
    use mandolin_common::models::DocumentType;
    use tokio_test::{assert_err, assert_ok};

    fn manifest(document_id: Option<&str>, pages: &[(u32, &str)]) -> DocumentManifest {
        DocumentManifest {
            document_id: document_id.map(str::to_string),
            filename: "press_line.pdf".to_string(),
            document_type: DocumentType::new("electrical_schematic").unwrap(),
            pages: pages
                .iter()
                .map(|(n, text)| PageInput {
                    page_number: *n,
                    text: text.to_string(),
                    image_path: None,
                })
                .collect(),
        }
    }

    fn indexer(index: Arc<InMemoryIndex>) -> Indexer {
        let config = IngestionConfig {
            embed_concurrency: 2,
            upsert_batch_size: 2,
        };
        Indexer::new(Arc::new(MockEmbedder::new(16)), index, config)
    }

    #[tokio::test]
    async fn test_index_document() {
        let index = Arc::new(InMemoryIndex::new());
        let report = indexer(index.clone())
            .index_document(manifest(
                Some("doc-7"),
                &[(1, "Relay K102 coil"), (2, "   "), (3, "Terminal X2:15"), (4, "Motor M1")],
            ))
            .await
            .unwrap();

        assert_eq!(report.document_id, "doc-7");
        assert_eq!(report.pages_seen, 4);
        assert_eq!(report.pages_indexed, 3);
        assert_eq!(report.pages_skipped, 1);
        assert!(report.component_ids.contains(&ComponentId::from_indexed("K102")));
        assert!(report.component_ids.contains(&ComponentId::from_indexed("X2:15")));
        assert_eq!(index.len(), 3);

        let hits = index
            .scan(&IndexFilter::component(&ComponentId::from_indexed("K102")), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "doc-7_page_1");
        assert!(hits[0].indexed_at.is_some());
    }

    #[tokio::test]
    async fn test_reindexing_replaces_pages() {
        let index = Arc::new(InMemoryIndex::new());
        let indexer = indexer(index.clone());
        let pages = [(1, "Relay K102"), (2, "Valve PV-001")];

        assert_ok!(indexer.index_document(manifest(Some("doc"), &pages)).await);
        assert_ok!(indexer.index_document(manifest(Some("doc"), &pages)).await);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_manifest_indexes_nothing() {
        let index = Arc::new(InMemoryIndex::new());
        let result = indexer(index.clone())
            .index_document(manifest(Some("doc"), &[(0, "Relay K102")]))
            .await;
        assert_err!(result);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_index_directory_skips_bad_manifests() {
        let dir = std::env::temp_dir().join(format!("mandolin-ingest-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("a.json"),
            serde_json::json!({
                "document_id": "a",
                "filename": "a.pdf",
                "document_type": "manual",
                "pages": [{ "page_number": 1, "text": "Valve PV-001" }]
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.join("b.json"), "{ not json").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let index = Arc::new(InMemoryIndex::new());
        let reports = indexer(index.clone()).index_directory(&dir).await.unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].document_id, "a");
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_reindexing_drops_removed_pages() {
        let index = Arc::new(InMemoryIndex::new());
        let indexer = indexer(index.clone());

        assert_ok!(
            indexer
                .index_document(manifest(
                    Some("doc"),
                    &[(1, "Relay K102"), (2, "Motor M1"), (3, "Valve PV-001")],
                ))
                .await
        );
        let report = assert_ok!(indexer.index_document(manifest(Some("doc"), &[(1, "Relay K102")])).await);

        assert_eq!(report.pages_indexed, 1);
        assert_eq!(index.len(), 1);
        let stale = index
            .scan(&IndexFilter::component(&ComponentId::from_indexed("PV-001")), 10)
            .await
            .unwrap();
        assert!(stale.is_empty());
    }

    #[tokio::test]
    async fn test_reindexing_leaves_other_documents() {
        let index = Arc::new(InMemoryIndex::new());
        let indexer = indexer(index.clone());

        assert_ok!(indexer.index_document(manifest(Some("a"), &[(1, "Relay K102")])).await);
        assert_ok!(indexer.index_document(manifest(Some("b"), &[(1, "Valve PV-001")])).await);
        assert_ok!(indexer.index_document(manifest(Some("a"), &[(1, "Relay K103")])).await);

        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_page_numbers_rejected() {
        let index = Arc::new(InMemoryIndex::new());
        let result = indexer(index.clone())
            .index_document(manifest(Some("d"), &[(1, "Relay K102"), (1, "Motor M1")]))
            .await;

        assert!(matches!(result, Err(IngestionError::InvalidManifest(_))));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_generated_document_id() {
        let index = Arc::new(InMemoryIndex::new());
        let report = indexer(index)
            .index_document(manifest(None, &[(1, "Relay K102")]))
            .await
            .unwrap();
        assert!(Uuid::parse_str(&report.document_id).is_ok());
    }

    #[tokio::test]
    async fn test_content_truncated() {
        let index = Arc::new(InMemoryIndex::new());
        let long = "K102 ".repeat(1000);
        let pages = vec![(1, long.as_str())];
        indexer(index.clone())
            .index_document(manifest(Some("doc"), &pages))
            .await
            .unwrap();

        let stored = index.scan(&IndexFilter::default(), 10).await.unwrap();
        assert_eq!(stored[0].content.chars().count(), INDEXED_CONTENT_CHARS);
    }
}
