//! Component identifier extraction
//!
//! Pattern-based, case-insensitive, no false-positive suppression. Recall
//! matters more than precision: an extra identifier only widens the
//! retrieval filter.

use crate::models::ComponentId;
use regex_lite::Regex;
use std::collections::BTreeSet;

/// Structural identifier patterns, applied in order
const COMPONENT_PATTERNS: &[&str] = &[
    // Letter prefix plus digits: K102, M1, PLC12
    r"\b[A-Z]{1,3}\d{1,4}\b",
    // Terminal addresses: X2:15
    r"\b[A-Z]\d+:\d+\b",
    // Hyphenated tag codes: PV-001, FT-12
    r"\b[A-Z]{2,3}-\d{2,4}\b",
    // Labelled annotations: Tag: ABC-123
    r"\bTag[:\s]*[A-Z0-9-]+\b",
];

/// Spatial/connectivity keywords that ask for cross-document answers
const CROSS_REFERENCE_KEYWORDS: &[&str] = &[
    "wired",
    "connected",
    "wiring",
    "electrical",
    "located",
    "location",
    "where",
    "how",
    "trace",
    "connection",
];

/// Extracts component identifiers from free text
#[derive(Debug, Clone)]
pub struct ComponentIdExtractor {
    patterns: Vec<Regex>,
    /// Same patterns, required to span the whole candidate
    anchored: Vec<Regex>,
}

impl Default for ComponentIdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentIdExtractor {
    pub fn new() -> Self {
        let compile = |template: &str| -> Vec<Regex> {
            COMPONENT_PATTERNS
                .iter()
                .map(|p| {
                    Regex::new(&template.replace("{}", p)).expect("component pattern must compile")
                })
                .collect()
        };
        Self {
            patterns: compile("(?i){}"),
            anchored: compile("(?i)^(?:{})$"),
        }
    }

    /// All identifiers in `text`, upper-cased and deduplicated
    pub fn extract(&self, text: &str) -> BTreeSet<ComponentId> {
        self.patterns
            .iter()
            .flat_map(|pattern| pattern.find_iter(text))
            .map(|m| ComponentId::from_match(m.as_str()))
            .collect()
    }

    /// Whether `candidate` as a whole matches one of the recognised patterns
    pub fn is_component(&self, candidate: &str) -> bool {
        self.anchored.iter().any(|p| p.is_match(candidate))
    }
}

/// Cross-referencing is requested only for spatial/connectivity questions
/// that name at least one component.
pub fn needs_cross_reference(text: &str, component_ids: &BTreeSet<ComponentId>) -> bool {
    if component_ids.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    CROSS_REFERENCE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &BTreeSet<ComponentId>) -> Vec<&str> {
        set.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_extracts_each_pattern_family() {
        let extractor = ComponentIdExtractor::new();

        let found = extractor.extract("Relay K102 feeds terminal X2:15 and valve PV-001");
        let found = ids(&found);
        assert!(found.contains(&"K102"));
        assert!(found.contains(&"X2:15"));
        assert!(found.contains(&"PV-001"));

        let tagged = extractor.extract("see Tag: AB-77 on the door");
        assert!(tagged.iter().any(|id| id.as_str().starts_with("TAG")));
    }

    #[test]
    fn test_case_insensitive_and_uppercased() {
        let extractor = ComponentIdExtractor::new();
        let found = extractor.extract("where is k102 and K102?");
        assert_eq!(ids(&found), vec!["K102"]);
    }

    #[test]
    fn test_output_is_uppercase_and_recognised() {
        let extractor = ComponentIdExtractor::new();
        let texts = [
            "Where is K102 wired?",
            "terminal x2:15, tag:pv-001, m1 m2 m3",
            "No identifiers in this sentence at all.",
            "Ω 12 µ K1-22 §3",
            "",
        ];

        for text in texts {
            for id in extractor.extract(text) {
                assert_eq!(id.as_str(), id.as_str().to_uppercase());
                assert!(extractor.is_component(id.as_str()), "{} not recognised", id);
            }
        }
    }

    #[test]
    fn test_is_component_requires_whole_match() {
        let extractor = ComponentIdExtractor::new();
        assert!(extractor.is_component("K102"));
        assert!(extractor.is_component("X2:15"));
        assert!(extractor.is_component("PV-001"));
        assert!(extractor.is_component("TAG: AB-77"));

        assert!(!extractor.is_component("Relay K102"));
        assert!(!extractor.is_component("K102!"));
        assert!(!extractor.is_component("K10234"));
        assert!(!extractor.is_component(""));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = ComponentIdExtractor::new();
        let text = "Motor M1 via K102 to X2:15; spare K102";
        assert_eq!(extractor.extract(text), extractor.extract(text));
        assert_eq!(extractor.extract(text).len(), 4);
    }

    #[test]
    fn test_no_matches() {
        let extractor = ComponentIdExtractor::new();
        assert!(extractor.extract("What is the torque specification?").is_empty());
    }

    #[test]
    fn test_cross_reference_trigger() {
        let extractor = ComponentIdExtractor::new();

        let text = "Where is K102 wired?";
        assert!(needs_cross_reference(text, &extractor.extract(text)));

        let text = "What voltage does K102 use?";
        assert!(!needs_cross_reference(text, &extractor.extract(text)));

        let text = "Where is the main switch?";
        assert!(!needs_cross_reference(text, &extractor.extract(text)));
    }
}
