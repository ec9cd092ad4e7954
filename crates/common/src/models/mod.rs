//! Domain models
//!
//! Value types shared by the retrieval layer, the query pipeline and the
//! HTTP/ingestion boundaries.

mod chunk;
mod citation;
mod component;
mod document_type;
mod query;

pub use chunk::{truncate_chars, ChunkPayload, INDEXED_CONTENT_CHARS};
pub use citation::{Citation, CrossReferenceMap, EXACT_MATCH_SCORE};
pub use component::ComponentId;
pub use document_type::DocumentType;
pub use query::{Query, QueryResponse, DEFAULT_MAX_CITATIONS};
