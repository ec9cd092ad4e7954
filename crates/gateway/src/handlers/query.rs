//! Question answering handler

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use mandolin_common::{
    errors::{AppError, Result},
    metrics::RequestMetrics,
    models::{DocumentType, Query, QueryResponse, DEFAULT_MAX_CITATIONS},
};

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,

    #[serde(default = "default_max_citations")]
    #[validate(range(min = 1, max = 50))]
    pub max_citations: usize,

    /// Restrict semantic retrieval to these document types
    #[serde(default)]
    pub document_types: Option<Vec<String>>,
}

fn default_max_citations() -> usize { DEFAULT_MAX_CITATIONS }

impl QueryRequest {
    fn into_query(self) -> Result<Query> {
        let types = self
            .document_types
            .unwrap_or_default()
            .iter()
            .map(DocumentType::new)
            .collect::<Result<Vec<_>>>()?;

        Ok(Query::new(self.query, self.max_citations)?.with_document_types(types))
    }
}

/// Answer a question from the indexed documents
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let metrics = RequestMetrics::start("POST", "/v1/query");

    let result = run(&state, request).await;
    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics.finish(status);

    result.map(Json)
}

async fn run(state: &AppState, request: QueryRequest) -> Result<QueryResponse> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().next().map(|k| k.to_string()),
    })?;

    let query = request.into_query()?;
    let timeout = state.config.request_timeout();

    let response = tokio::time::timeout(timeout, state.controller.answer_query(query))
        .await
        .map_err(|_| AppError::ServiceUnavailable {
            message: format!("query exceeded {}s deadline", timeout.as_secs()),
        })??;

    tracing::info!(
        grounded = response.grounded,
        confidence = response.confidence,
        citations = response.citations.len(),
        attempts = response.attempts,
        "Query completed"
    );

    Ok(response)
}
