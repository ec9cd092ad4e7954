//! Grounded answer generation
//!
//! Builds a prompt that enumerates the leading evidence as numbered sources
//! and binds the model to them.

use crate::errors::Result;
use crate::llm::TextGenerator;
use crate::models::{Citation, CrossReferenceMap, Query};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Canonical admission for questions the corpus cannot answer
pub const NOT_AVAILABLE_ANSWER: &str = "Information not available in uploaded documents.";

/// Produces draft answers from retrieved evidence
pub struct AnswerGenerator {
    generator: Arc<dyn TextGenerator>,
    prompt_citations: usize,
    max_tokens: usize,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, prompt_citations: usize, max_tokens: usize) -> Self {
        Self {
            generator,
            prompt_citations,
            max_tokens,
        }
    }

    /// Generate a draft from the evidence pool.
    ///
    /// Only the first `prompt_citations` entries are shown to the model.
    /// Without evidence the model is not called and the canonical admission
    /// is returned.
    #[instrument(skip_all, fields(model = self.generator.model_name(), evidence = citations.len()))]
    pub async fn generate(
        &self,
        query: &Query,
        citations: &[Citation],
        cross_references: &CrossReferenceMap,
    ) -> Result<String> {
        if citations.is_empty() {
            debug!("No evidence, answering with admission");
            return Ok(NOT_AVAILABLE_ANSWER.to_string());
        }

        let prompt = self.build_prompt(query, citations, cross_references);
        let draft = self.generator.complete(&prompt, self.max_tokens).await?;
        debug!(draft_chars = draft.chars().count(), "Draft generated");
        Ok(draft)
    }

    /// Build the grounding prompt
    pub fn build_prompt(
        &self,
        query: &Query,
        citations: &[Citation],
        cross_references: &CrossReferenceMap,
    ) -> String {
        let sources = citations
            .iter()
            .take(self.prompt_citations)
            .enumerate()
            .map(|(i, c)| {
                format!(
                    "[Source {}] {}, Page {} ({}):\n{}\n",
                    i + 1,
                    c.filename,
                    c.page_number,
                    c.document_type,
                    c.snippet.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a technical expert assistant analyzing engineering documentation.\n\
            Answer the user's question based ONLY on the provided source material.\n\n\
            CRITICAL RULES:\n\
            1. ONLY use information explicitly stated in the sources\n\
            2. Cite sources using [Source N] format for every factual claim\n\
            3. If information is not available, say \"{}\"\n\
            4. Never infer, speculate, or use outside knowledge\n\
            5. For component locations/connections, specify the exact document and page\n\n\
            Question: {}\n\n\
            Available Sources:\n{}{}\n\
            Provide a clear, grounded answer:",
            NOT_AVAILABLE_ANSWER.trim_end_matches('.'),
            query.text,
            sources,
            cross_reference_summary(cross_references),
        )
    }
}

/// Which document types each identifier was found in
pub fn cross_reference_summary(cross_references: &CrossReferenceMap) -> String {
    if cross_references.is_empty() {
        return String::new();
    }

    let mut summary = String::from("\nCross-document references:");
    for (component_id, by_type) in cross_references {
        let types: Vec<&str> = by_type.keys().map(|t| t.as_str()).collect();
        let _ = write!(summary, "\n- {} found in: {}", component_id, types.join(", "));
    }
    summary
}
