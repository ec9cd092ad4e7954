//! Heuristic groundedness check
//!
//! No model call. A draft is grounded when it cites a source or explicitly
//! admits the information is missing, and contains no hedging.

use serde::Serialize;

/// Marker the prompt asks the model to use for citations
const SOURCE_MARKER: &str = "[Source";

/// Phrases admitting the answer is not in the documents (lower case)
const ADMISSION_PHRASES: &[&str] = &["not available", "not found"];

/// Hedging phrases that suggest unsupported claims (lower case)
const HEDGE_PHRASES: &[&str] = &[
    "i believe",
    "i think",
    "probably",
    "might be",
    "could be",
    "typically",
    "usually",
    "generally",
    "in my experience",
];

pub const BASE_CONFIDENCE: f32 = 0.8;
pub const MARKER_BONUS: f32 = 0.1;
pub const HEDGE_PENALTY: f32 = 0.3;

/// Confidence when the generator had no evidence at all
pub const NO_EVIDENCE_CONFIDENCE: f32 = 0.2;

/// Outcome of verifying one draft
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub grounded: bool,
    pub confidence: f32,
    pub cites_sources: bool,
    pub admits_absence: bool,
    pub hedges: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroundednessVerifier;

impl GroundednessVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `draft`, given how many citations were available to the
    /// generator.
    pub fn verify(&self, draft: &str, citation_count: usize) -> Verdict {
        let lowered = draft.to_lowercase();

        let cites_sources = draft.contains(SOURCE_MARKER);
        let admits_absence = ADMISSION_PHRASES.iter().any(|p| lowered.contains(p));
        let hedges = HEDGE_PHRASES.iter().any(|p| lowered.contains(p));

        let mut confidence = BASE_CONFIDENCE;
        if cites_sources {
            confidence += MARKER_BONUS;
        }
        if hedges {
            confidence -= HEDGE_PENALTY;
        }
        if citation_count == 0 {
            confidence = NO_EVIDENCE_CONFIDENCE;
        }

        Verdict {
            grounded: (cites_sources || admits_absence) && !hedges,
            confidence: confidence.clamp(0.0, 1.0),
            cites_sources,
            admits_absence,
            hedges,
        }
    }
}
