//! Per-query working record of the pipeline

use super::verifier::Verdict;
use crate::models::{Citation, ComponentId, CrossReferenceMap, Query, QueryResponse};
use std::collections::BTreeSet;

/// State threaded through the pipeline stages.
///
/// Owned by exactly one query evaluation. Each stage takes it by value and
/// hands back the next snapshot.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub query: Query,
    pub component_ids: BTreeSet<ComponentId>,
    pub needs_cross_reference: bool,

    /// Evidence pool, append-only for the whole evaluation
    pub citations: Vec<Citation>,
    pub cross_references: CrossReferenceMap,

    pub draft: Option<String>,
    pub final_answer: Option<String>,
    pub grounded: bool,
    pub confidence: f32,
    pub retry_count: u32,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            component_ids: BTreeSet::new(),
            needs_cross_reference: false,
            citations: Vec::new(),
            cross_references: CrossReferenceMap::new(),
            draft: None,
            final_answer: None,
            grounded: false,
            confidence: 0.0,
            retry_count: 0,
            error: None,
        }
    }

    /// Record a verdict; the draft becomes the answer of this attempt
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.final_answer = self.draft.clone();
        self.grounded = verdict.grounded;
        self.confidence = verdict.confidence;
        self
    }

    /// State for the next attempt: evidence and counter carry over, the
    /// previous attempt's draft and verdict do not.
    pub fn next_attempt(self) -> Self {
        Self {
            component_ids: BTreeSet::new(),
            needs_cross_reference: false,
            draft: None,
            final_answer: None,
            grounded: false,
            confidence: 0.0,
            retry_count: self.retry_count + 1,
            error: None,
            ..self
        }
    }

    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// Terminal snapshot to response; citations truncated to the requested
    /// maximum
    pub fn into_response(self) -> QueryResponse {
        let attempts = self.attempts();
        let mut citations = self.citations;
        citations.truncate(self.query.max_citations);

        QueryResponse {
            answer: self.final_answer.unwrap_or_default(),
            citations,
            confidence: self.confidence,
            cross_references: self.cross_references.into_keys().collect(),
            grounded: self.grounded,
            attempts,
        }
    }
}
