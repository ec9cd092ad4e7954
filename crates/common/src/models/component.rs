//! Component identifiers (K102, X2:15, PV-001, ...)

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Upper-cased structural identifier of a physical/engineering part.
///
/// Values come from `ComponentIdExtractor` or from metadata that the
/// extractor produced at indexing time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Wrap an extractor match, normalising to upper case
    pub(crate) fn from_match(raw: &str) -> Self {
        Self(raw.to_uppercase())
    }

    /// Identifier read back from index metadata
    pub fn from_indexed(raw: &str) -> Self {
        Self::from_match(raw.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ComponentId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ComponentId::from_indexed(&raw))
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
