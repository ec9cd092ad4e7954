//! Free-form document-type label
//!
//! Classification may propose labels nobody anticipated ("pneumatic layout",
//! "bill of materials", ...), so the type is an open set. Labels are
//! normalised on construction so grouping by exact value is deterministic.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Validated document-type label, e.g. `electrical_schematic`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentType(String);

impl DocumentType {
    /// Label used when a page carries no classification
    pub const UNKNOWN: &'static str = "unknown";

    /// Normalise and validate a label.
    ///
    /// Trims, lower-cases and collapses runs of whitespace, `-` and `_`
    /// into a single `_`. Empty labels are rejected.
    pub fn new(label: impl AsRef<str>) -> Result<Self> {
        let mut normalized = String::new();
        let mut pending_sep = false;

        for ch in label.as_ref().trim().chars() {
            if ch.is_whitespace() || ch == '-' || ch == '_' {
                pending_sep = true;
                continue;
            }
            if pending_sep && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_sep = false;
            normalized.extend(ch.to_lowercase());
        }

        if normalized.is_empty() {
            return Err(AppError::Validation {
                message: "document type label must not be empty".to_string(),
                field: Some("document_type".to_string()),
            });
        }

        Ok(Self(normalized))
    }

    /// The `unknown` label
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Lenient conversion for labels read back from the index: anything
    /// that fails validation becomes `unknown`.
    pub fn from_indexed(label: Option<&str>) -> Self {
        label
            .and_then(|l| Self::new(l).ok())
            .unwrap_or_else(Self::unknown)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DocumentType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DocumentType::new(raw).map_err(serde::de::Error::custom)
    }
}
