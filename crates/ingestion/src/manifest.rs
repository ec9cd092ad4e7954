//! Page manifests produced by the upstream extractor/classifier

use crate::errors::IngestionError;
use mandolin_common::models::DocumentType;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// One document with its already-extracted, already-classified pages
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentManifest {
    /// Generated when absent
    #[serde(default)]
    pub document_id: Option<String>,
    pub filename: String,
    pub document_type: DocumentType,
    pub pages: Vec<PageInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageInput {
    /// 1-indexed
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl DocumentManifest {
    /// Read and validate a manifest file
    pub async fn load(path: &Path) -> Result<Self, IngestionError> {
        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let raw = tokio::fs::read_to_string(path).await?;
        let manifest: Self = serde_json::from_str(&raw).map_err(|e| IngestionError::ManifestParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.filename.trim().is_empty() {
            return Err(IngestionError::InvalidManifest("filename must not be empty".to_string()));
        }
        if let Some(page) = self.pages.iter().find(|p| p.page_number == 0) {
            return Err(IngestionError::InvalidManifest(format!(
                "page numbers are 1-indexed, got {} in {}",
                page.page_number, self.filename
            )));
        }

        // Pages share a point id per page number
        let mut seen = BTreeSet::new();
        if let Some(page) = self.pages.iter().find(|p| !seen.insert(p.page_number)) {
            return Err(IngestionError::InvalidManifest(format!(
                "page {} appears more than once in {}",
                page.page_number, self.filename
            )));
        }
        Ok(())
    }
}
