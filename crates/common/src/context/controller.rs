//! Query controller: the bounded-retry state machine
//!
//! ParseQuery -> Retrieve -> [CrossReference] -> Generate -> Verify, then
//! either accept or start over from ParseQuery with the retry counter
//! incremented. Stages run strictly in sequence.

use super::extractor::{needs_cross_reference, ComponentIdExtractor};
use super::generator::AnswerGenerator;
use super::state::PipelineState;
use super::verifier::GroundednessVerifier;
use crate::config::{AppConfig, PipelineConfig};
use crate::embeddings::{create_embedder, Embedder};
use crate::errors::{AppError, Result};
use crate::index::{create_index, VectorIndex};
use crate::llm::{create_generator, TextGenerator};
use crate::metrics;
use crate::models::{ComponentId, Query, QueryResponse};
use crate::retrieval::{CrossReferenceResolver, RetrievalClient};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ParseQuery,
    Retrieve,
    CrossReference,
    Generate,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ParseQuery => "parse_query",
            Stage::Retrieve => "retrieve",
            Stage::CrossReference => "cross_reference",
            Stage::Generate => "generate",
            Stage::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// What a stage hands back to the run loop
enum Transition {
    Next(Stage, PipelineState),
    Accept(PipelineState),
    Failed(PipelineState, AppError),
}

/// Orchestrates extraction, retrieval, cross-referencing, generation and
/// verification for one query at a time. Holds no per-query state, so one
/// instance serves concurrent queries.
pub struct QueryController {
    extractor: ComponentIdExtractor,
    retrieval: Arc<RetrievalClient>,
    resolver: CrossReferenceResolver,
    generator: AnswerGenerator,
    verifier: GroundednessVerifier,
    config: PipelineConfig,
}

impl QueryController {
    pub fn new(
        config: &PipelineConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        text_generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let retrieval = Arc::new(RetrievalClient::new(embedder, index, config.snippet_chars));

        Self {
            extractor: ComponentIdExtractor::new(),
            resolver: CrossReferenceResolver::new(retrieval.clone(), config.lookup_limit),
            retrieval,
            generator: AnswerGenerator::new(text_generator, config.prompt_citations, config.max_tokens),
            verifier: GroundednessVerifier::new(),
            config: config.clone(),
        }
    }

    /// Build the controller and its collaborators from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.vector_store)?;
        let text_generator = create_generator(&config.llm)?;

        info!(
            embedder = embedder.model_name(),
            index = index.name(),
            generator = text_generator.model_name(),
            "Query controller initialized"
        );

        Ok(Self::new(&config.pipeline, embedder, index, text_generator))
    }

    pub fn retrieval(&self) -> &RetrievalClient {
        &self.retrieval
    }

    /// Answer a question with at most `max_citations` citations
    pub async fn answer(&self, text: &str, max_citations: usize) -> Result<QueryResponse> {
        self.answer_query(Query::new(text, max_citations)?).await
    }

    /// Run the state machine to completion for one query
    #[instrument(skip_all, fields(max_citations = query.max_citations))]
    pub async fn answer_query(&self, query: Query) -> Result<QueryResponse> {
        let start = Instant::now();
        let mut stage = Stage::ParseQuery;
        let mut state = PipelineState::new(query);

        loop {
            debug!(%stage, attempt = state.attempts(), "Entering stage");

            state = match self.step(stage, state).await {
                Transition::Next(next, next_state) => {
                    stage = next;
                    next_state
                }
                Transition::Accept(final_state) => {
                    info!(
                        grounded = final_state.grounded,
                        confidence = final_state.confidence,
                        attempts = final_state.attempts(),
                        citations = final_state.citations.len(),
                        "Query answered"
                    );
                    metrics::record_query(
                        start.elapsed().as_secs_f64(),
                        final_state.attempts(),
                        final_state.grounded,
                    );
                    return Ok(final_state.into_response());
                }
                Transition::Failed(mut failed_state, error) => {
                    failed_state.error = Some(error.to_string());
                    warn!(
                        %stage,
                        attempt = failed_state.attempts(),
                        transient = error.is_transient(),
                        error = failed_state.error.as_deref().unwrap_or_default(),
                        "Query evaluation failed"
                    );
                    metrics::record_query_failure();
                    return Err(error);
                }
            };
        }
    }

    async fn step(&self, stage: Stage, state: PipelineState) -> Transition {
        match stage {
            Stage::ParseQuery => self.parse_query(state),
            Stage::Retrieve => self.retrieve(state).await,
            Stage::CrossReference => self.cross_reference(state).await,
            Stage::Generate => self.generate(state).await,
            Stage::Verify => self.verify(state),
        }
    }

    fn parse_query(&self, mut state: PipelineState) -> Transition {
        state.component_ids = self.extractor.extract(&state.query.text);
        state.needs_cross_reference = needs_cross_reference(&state.query.text, &state.component_ids);

        debug!(
            components = ?state.component_ids,
            cross_reference = state.needs_cross_reference,
            "Query parsed"
        );
        Transition::Next(Stage::Retrieve, state)
    }

    async fn retrieve(&self, mut state: PipelineState) -> Transition {
        let limit = self.config.overfetch_factor.saturating_mul(state.query.max_citations);
        let component_filter: Vec<ComponentId> = state.component_ids.iter().cloned().collect();

        let result = self
            .retrieval
            .search(
                &state.query.text,
                limit,
                Some(component_filter.as_slice()),
                state.query.document_types.as_deref(),
            )
            .await;

        match result {
            Ok(citations) => {
                debug!(retrieved = citations.len(), limit, "Evidence retrieved");
                state.citations.extend(citations);
                let next = if state.needs_cross_reference {
                    Stage::CrossReference
                } else {
                    Stage::Generate
                };
                Transition::Next(next, state)
            }
            Err(e) => Transition::Failed(state, e),
        }
    }

    async fn cross_reference(&self, mut state: PipelineState) -> Transition {
        let result = self
            .resolver
            .resolve_all(&state.component_ids, self.config.citations_per_type)
            .await;

        match result {
            Ok(resolution) => {
                debug!(
                    components = resolution.map.len(),
                    appended = resolution.evidence.len(),
                    "Cross-references resolved"
                );
                state.citations.extend(resolution.evidence);
                state.cross_references = resolution.map;
                Transition::Next(Stage::Generate, state)
            }
            Err(e) => Transition::Failed(state, e),
        }
    }

    async fn generate(&self, mut state: PipelineState) -> Transition {
        let result = self
            .generator
            .generate(&state.query, &state.citations, &state.cross_references)
            .await;

        match result {
            Ok(draft) => {
                state.draft = Some(draft);
                Transition::Next(Stage::Verify, state)
            }
            Err(e) => Transition::Failed(state, e),
        }
    }

    fn verify(&self, state: PipelineState) -> Transition {
        let draft = state.draft.as_deref().unwrap_or_default();
        let verdict = self.verifier.verify(draft, state.citations.len());
        debug!(?verdict, "Draft verified");

        let state = state.with_verdict(verdict);

        if state.retry_count >= self.config.max_retries {
            return Transition::Accept(state);
        }

        if !state.grounded && !state.citations.is_empty() {
            warn!(
                retry = state.retry_count + 1,
                confidence = state.confidence,
                "Draft not grounded, retrying"
            );
            metrics::record_retry();
            return Transition::Next(Stage::ParseQuery, state.next_attempt());
        }

        Transition::Accept(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NOT_AVAILABLE_ANSWER;
    use crate::embeddings::{EmbeddingRole, MockEmbedder};
    use crate::index::{IndexFilter, IndexPoint, InMemoryIndex, ScoredPayload};
    use crate::llm::MockGenerator;
    use crate::models::{ChunkPayload, DocumentType};
    use crate::test_support::{fixture, Page, DIMENSION};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Replays scripted drafts, repeating the last one, and counts calls
    struct Scripted {
        drafts: Mutex<VecDeque<String>>,
        last: String,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(drafts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                drafts: Mutex::new(drafts.iter().map(|d| d.to_string()).collect()),
                last: drafts.last().map(|d| d.to_string()).unwrap_or_default(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn complete(&self, _prompt: &str, _max_tokens: usize) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.drafts.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.last.clone()))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct Unreachable;

    #[async_trait]
    impl TextGenerator for Unreachable {
        async fn complete(&self, _prompt: &str, _max_tokens: usize) -> Result<String> {
            Err(AppError::Generation {
                message: "connection refused".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "unreachable"
        }
    }

    struct DownIndex;

    #[async_trait]
    impl VectorIndex for DownIndex {
        async fn upsert(&self, _points: Vec<IndexPoint>) -> Result<()> {
            Err(down())
        }

        async fn delete_document(&self, _document_id: &str) -> Result<()> {
            Err(down())
        }

        async fn search(
            &self,
            _vector: &[f32],
            _filter: &IndexFilter,
            _limit: usize,
        ) -> Result<Vec<ScoredPayload>> {
            Err(down())
        }

        async fn scan(&self, _filter: &IndexFilter, _limit: usize) -> Result<Vec<ChunkPayload>> {
            Err(down())
        }

        async fn health_check(&self) -> Result<()> {
            Err(down())
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn down() -> AppError {
        AppError::VectorIndex {
            message: "connection refused".to_string(),
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
            Err(AppError::EmbeddingError {
                message: "503 from provider".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            DIMENSION
        }
    }

    fn wiring_pages() -> Vec<Page> {
        vec![
            Page::new("sch", "schematic.pdf", 4, "electrical_schematic", "Relay K102 coil wired to X2:15"),
            Page::new("sch", "schematic.pdf", 5, "electrical_schematic", "K102 contacts feed motor M1"),
            Page::new("lay", "layout.pdf", 2, "media_layout", "Cabinet A2 holds K102 next to K103"),
            Page::new("man", "manual.pdf", 9, "manual", "Maintenance interval for the press"),
        ]
    }

    async fn controller_with(pages: &[Page]) -> QueryController {
        controller(pages, Arc::new(MockGenerator)).await
    }

    async fn controller(pages: &[Page], generator: Arc<dyn TextGenerator>) -> QueryController {
        let fx = fixture(pages).await;
        QueryController::new(&PipelineConfig::default(), fx.embedder, fx.index, generator)
    }

    #[tokio::test]
    async fn test_cross_reference_across_document_types() {
        let controller = controller(&wiring_pages(), Arc::new(MockGenerator)).await;

        let response = assert_ok!(controller.answer("Where is K102 wired?", 5).await);

        assert_eq!(response.cross_references, vec![ComponentId::from_indexed("K102")]);
        let types: Vec<&str> = response.citations.iter().map(|c| c.document_type.as_str()).collect();
        assert!(types.contains(&"electrical_schematic"));
        assert!(types.contains(&"media_layout"));
        assert!(response.grounded);
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test]
    async fn test_cross_reference_map_holds_both_types() {
        let fx = fixture(&wiring_pages()).await;
        let resolver = CrossReferenceResolver::new(fx.retrieval.clone(), 50);
        let by_type = resolver.resolve(&ComponentId::from_indexed("K102")).await.unwrap();

        assert!(by_type.contains_key(&DocumentType::new("electrical_schematic").unwrap()));
        assert!(by_type.contains_key(&DocumentType::new("media_layout").unwrap()));
    }

    #[tokio::test]
    async fn test_nothing_found_does_not_retry() {
        let generator = Scripted::new(&["should never be used"]);
        let controller = QueryController::new(
            &PipelineConfig::default(),
            Arc::new(MockEmbedder::new(DIMENSION)),
            Arc::new(InMemoryIndex::new()),
            generator.clone(),
        );

        let response = assert_ok!(controller.answer("What is the torque spec?", 5).await);

        assert!(response.grounded);
        assert!((response.confidence - 0.2).abs() < 1e-6);
        assert!(response.citations.is_empty());
        assert_eq!(response.answer, NOT_AVAILABLE_ANSWER);
        assert_eq!(response.attempts, 1);
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_cited_draft_is_accepted() {
        let pages = vec![
            Page::new("m", "manual.pdf", 1, "manual", "Torque for the spindle is 40 Nm"),
            Page::new("m", "manual.pdf", 2, "manual", "Spindle lubrication schedule"),
            Page::new("m", "manual.pdf", 3, "manual", "Spindle bearing replacement"),
        ];
        let generator = Scripted::new(&["Spindle torque is 40 Nm [Source 1]."]);
        let controller = controller(&pages, generator.clone()).await;

        let response = assert_ok!(controller.answer("What torque does the spindle need?", 5).await);

        assert_eq!(response.citations.len(), 3);
        assert!(response.grounded);
        assert!((response.confidence - 0.9).abs() < 1e-6);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let generator = Scripted::new(&["It is probably in the cabinet."]);
        let controller = controller(&wiring_pages(), generator.clone()).await;

        let response = assert_ok!(controller.answer("Where is K102 wired?", 5).await);

        assert!(!response.grounded);
        assert_eq!(response.attempts, 3);
        assert_eq!(generator.calls(), 3);
        assert_eq!(response.answer, "It is probably in the cabinet.");
        assert!((response.confidence - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_latest_attempt_wins() {
        let generator = Scripted::new(&[
            "K102 might be near the door [Source 1].",
            "K102 is in cabinet A2 [Source 3].",
        ]);
        let controller = controller(&wiring_pages(), generator.clone()).await;

        let response = assert_ok!(controller.answer("Where is K102 located?", 5).await);

        assert!(response.grounded);
        assert_eq!(response.attempts, 2);
        assert_eq!(generator.calls(), 2);
        assert_eq!(response.answer, "K102 is in cabinet A2 [Source 3].");
    }

    #[tokio::test]
    async fn test_citations_never_exceed_requested() {
        let pages: Vec<Page> = (1..=12)
            .map(|p| {
                let doc_type = if p % 2 == 0 { "electrical_schematic" } else { "media_layout" };
                Page::new("d", "d.pdf", p, doc_type, "Relay K102 wiring")
            })
            .collect();
        let controller = controller(&pages, Arc::new(MockGenerator)).await;

        for max in [1, 2, 3, 7] {
            let response = assert_ok!(controller.answer("How is K102 wired?", max).await);
            assert!(response.citations.len() <= max);
        }
    }

    #[tokio::test]
    async fn test_configured_retry_bound() {
        let config = PipelineConfig {
            max_retries: 0,
            ..PipelineConfig::default()
        };
        let fx = fixture(&wiring_pages()).await;
        let generator = Scripted::new(&["Usually near the PLC."]);
        let controller = QueryController::new(&config, fx.embedder, fx.index, generator.clone());

        let response = assert_ok!(controller.answer("Where is K102?", 5).await);
        assert_eq!(response.attempts, 1);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_query() {
        let controller = controller(&wiring_pages(), Arc::new(Unreachable)).await;

        let err = assert_err!(controller.answer("Where is K102 wired?", 5).await);
        assert!(matches!(err, AppError::Generation { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_index_aborts_without_retry() {
        let generator = Scripted::new(&["K102 is in cabinet A2 [Source 1]."]);
        let controller = QueryController::new(
            &PipelineConfig::default(),
            Arc::new(MockEmbedder::new(DIMENSION)),
            Arc::new(DownIndex),
            generator.clone(),
        );

        let err = assert_err!(controller.answer("Where is K102 wired?", 5).await);
        assert!(matches!(err, AppError::VectorIndex { .. }));
        assert!(err.is_transient());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_without_retry() {
        let fx = fixture(&wiring_pages()).await;
        let generator = Scripted::new(&["K102 is in cabinet A2 [Source 1]."]);
        let controller = QueryController::new(
            &PipelineConfig::default(),
            Arc::new(FailingEmbedder),
            fx.index,
            generator.clone(),
        );

        let err = assert_err!(controller.answer("Where is K102 wired?", 5).await);
        assert!(matches!(err, AppError::EmbeddingError { .. }));
        assert!(err.is_transient());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_huge_citation_limit_does_not_overflow() {
        let controller = QueryController::new(
            &PipelineConfig::default(),
            Arc::new(MockEmbedder::new(DIMENSION)),
            Arc::new(InMemoryIndex::new()),
            Arc::new(MockGenerator),
        );

        let response = assert_ok!(controller.answer("What is the torque spec?", usize::MAX).await);
        assert_eq!(response.answer, NOT_AVAILABLE_ANSWER);
        assert!(response.citations.is_empty());

        let controller = controller_with(&wiring_pages()).await;
        let response = assert_ok!(controller.answer("Where is K102 wired?", usize::MAX).await);
        assert!(!response.citations.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_query_rejected() {
        let controller = controller(&wiring_pages(), Arc::new(MockGenerator)).await;
        let err = assert_err!(controller.answer("   ", 5).await);
        assert!(matches!(err, AppError::InvalidQuery { .. }));
    }

    #[test]
    fn test_offline_config_builds() {
        assert!(QueryController::from_config(&AppConfig::offline()).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_queries_are_independent() {
        let controller = Arc::new(controller(&wiring_pages(), Arc::new(MockGenerator)).await);

        let handles: Vec<_> = ["Where is K102 wired?", "What is the torque spec for M1?"]
            .into_iter()
            .map(|q| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.answer(q, 3).await })
            })
            .collect();

        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert!(response.citations.len() <= 3);
        }
    }
}
