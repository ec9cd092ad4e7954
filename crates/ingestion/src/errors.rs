//! Ingestion service error types

use mandolin_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Manifest parse error for {path}: {message}")]
    ManifestParse { path: String, message: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Indexing error: {0}")]
    Indexing(#[from] AppError),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
