//! Mandolin Common Library
//!
//! Shared code for the Mandolin services:
//! - Domain models (citations, component identifiers, document types)
//! - Embedding, vector index and text generation clients
//! - Retrieval and cross-document reference resolution
//! - The agentic query pipeline (context engine)
//! - Error types, configuration, metrics

pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod retrieval;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::QueryController;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::VectorIndex;
pub use llm::TextGenerator;
pub use models::{Citation, ComponentId, DocumentType, Query, QueryResponse};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
