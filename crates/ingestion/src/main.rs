//! Mandolin Ingestion Service
//!
//! Indexes extracted, classified document pages:
//! 1. Reads page manifests (files or directories of `*.json`)
//! 2. Extracts component identifiers per page
//! 3. Embeds page text and upserts it into the vector store

mod errors;
mod manifest;
mod processor;

use mandolin_common::{
    config::{AppConfig, ObservabilityConfig},
    embeddings::create_embedder,
    index::{create_index, QdrantIndex, VectorIndex},
    VERSION,
};
use processor::{IngestionReport, Indexer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability);
    info!("Starting Mandolin Ingestion Service v{}", VERSION);

    let inputs: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        warn!("No manifests given. Usage: ingestion <manifest.json|dir>...");
        return Ok(());
    }

    let embedder = create_embedder(&config.embedding)?;
    info!(
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder ready"
    );

    let index: Arc<dyn VectorIndex> = if config.vector_store.backend == "qdrant" {
        let qdrant = QdrantIndex::new(&config.vector_store)?;
        qdrant.ensure_collection(embedder.dimension()).await?;
        Arc::new(qdrant)
    } else {
        warn!(
            backend = %config.vector_store.backend,
            "Non-persistent vector index, indexed pages are dropped on exit"
        );
        create_index(&config.vector_store)?
    };
    info!(backend = index.name(), "Vector index ready");

    let indexer = Indexer::new(embedder, index, config.ingestion.clone());

    let mut reports: Vec<IngestionReport> = Vec::new();
    let mut failures = 0usize;
    for path in &inputs {
        let result = if path.is_dir() {
            indexer.index_directory(path).await
        } else {
            indexer.index_file(path).await.map(|r| vec![r])
        };

        match result {
            Ok(mut batch) => reports.append(&mut batch),
            Err(e) => {
                failures += 1;
                error!(path = %path.display(), error = %e, "Ingestion failed");
            }
        }
    }

    for report in &reports {
        info!(
            document_id = %report.document_id,
            filename = %report.filename,
            pages_seen = report.pages_seen,
            pages_indexed = report.pages_indexed,
            pages_skipped = report.pages_skipped,
            components = report.component_ids.len(),
            "Report"
        );
    }

    let pages: usize = reports.iter().map(|r| r.pages_indexed).sum();
    info!(documents = reports.len(), pages, failures, "Ingestion complete");

    if failures > 0 {
        return Err(format!("{} input(s) failed to ingest", failures).into());
    }
    Ok(())
}

/// Initialize the tracing subscriber from the observability section
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
