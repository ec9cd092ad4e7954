//! Qdrant vector store over its REST API

use super::{IndexFilter, IndexPoint, ScoredPayload, VectorIndex};
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::ChunkPayload;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Payload fields that get a keyword index for filtering
const KEYWORD_FIELDS: &[&str] = &["document_type", "document_id", "component_ids"];

/// Qdrant collection client
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct UpsertRequest {
    points: Vec<QdrantPoint>,
}

#[derive(Serialize)]
struct QdrantPoint {
    id: u64,
    vector: Vec<f32>,
    payload: ChunkPayload,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    limit: usize,
    with_payload: bool,
}

#[derive(Serialize)]
struct ScrollRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    limit: usize,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct SearchHit {
    score: f32,
    payload: Option<ChunkPayload>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<ScrollPoint>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    payload: Option<ChunkPayload>,
}

impl QdrantIndex {
    /// Create a new Qdrant client for the configured collection
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Send a request and decode the `result` envelope
    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(|e| AppError::VectorIndex {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorIndex {
                message: format!("Qdrant error {}: {}", status, body),
            });
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| AppError::VectorIndex {
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(envelope.result)
    }

    /// Translate an `IndexFilter` into Qdrant's `must` clause
    fn filter_json(filter: &IndexFilter) -> Option<Value> {
        let mut must = Vec::new();

        if let Some(types) = filter.document_types.as_ref().filter(|t| !t.is_empty()) {
            let values: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            must.push(json!({ "key": "document_type", "match": { "any": values } }));
        }

        if let Some(ids) = filter.component_ids.as_ref().filter(|i| !i.is_empty()) {
            let values: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
            must.push(json!({ "key": "component_ids", "match": { "any": values } }));
        }

        if must.is_empty() {
            None
        } else {
            Some(json!({ "must": must }))
        }
    }

    /// Points selector matching every page of one document
    fn document_selector(document_id: &str) -> Value {
        json!({
            "filter": {
                "must": [{ "key": "document_id", "match": { "value": document_id } }]
            }
        })
    }

    /// Create the collection and its payload indices if missing
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let response = self
            .request(reqwest::Method::GET, &self.collection_url(""))
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Request failed: {}", e),
            })?;

        if response.status().is_success() {
            debug!(collection = %self.collection, "Collection already exists");
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(AppError::VectorIndex {
                message: format!("Unexpected status {} checking collection", response.status()),
            });
        }

        info!(collection = %self.collection, dimension, "Creating collection");
        let _: Value = self
            .send(
                self.request(reqwest::Method::PUT, &self.collection_url(""))
                    .json(&json!({ "vectors": { "size": dimension, "distance": "Cosine" } })),
            )
            .await?;

        for field in KEYWORD_FIELDS {
            let _: Value = self
                .send(
                    self.request(reqwest::Method::PUT, &self.collection_url("/index"))
                        .json(&json!({ "field_name": field, "field_schema": "keyword" })),
                )
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            points: points
                .into_iter()
                .map(|p| QdrantPoint {
                    id: p.id,
                    vector: p.vector,
                    payload: p.payload,
                })
                .collect(),
        };

        let _: Value = self
            .send(
                self.request(reqwest::Method::PUT, &self.collection_url("/points?wait=true"))
                    .json(&request),
            )
            .await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let _: Value = self
            .send(
                self.request(reqwest::Method::POST, &self.collection_url("/points/delete?wait=true"))
                    .json(&Self::document_selector(document_id)),
            )
            .await?;
        debug!(document_id, "Document points deleted");
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &IndexFilter,
        limit: usize,
    ) -> Result<Vec<ScoredPayload>> {
        let start = Instant::now();
        let request = SearchRequest {
            vector,
            filter: Self::filter_json(filter),
            limit,
            with_payload: true,
        };

        let hits: Vec<SearchHit> = self
            .send(
                self.request(reqwest::Method::POST, &self.collection_url("/points/search"))
                    .json(&request),
            )
            .await?;

        let results: Vec<ScoredPayload> = hits
            .into_iter()
            .filter_map(|hit| {
                hit.payload.map(|payload| ScoredPayload {
                    score: hit.score,
                    payload,
                })
            })
            .collect();

        metrics::record_retrieval(start.elapsed().as_secs_f64(), "search", results.len());
        Ok(results)
    }

    async fn scan(&self, filter: &IndexFilter, limit: usize) -> Result<Vec<ChunkPayload>> {
        let start = Instant::now();
        let request = ScrollRequest {
            filter: Self::filter_json(filter),
            limit,
            with_payload: true,
            with_vector: false,
        };

        let page: ScrollPage = self
            .send(
                self.request(reqwest::Method::POST, &self.collection_url("/points/scroll"))
                    .json(&request),
            )
            .await?;

        let results: Vec<ChunkPayload> = page.points.into_iter().filter_map(|p| p.payload).collect();

        metrics::record_retrieval(start.elapsed().as_secs_f64(), "scan", results.len());
        Ok(results)
    }

    async fn health_check(&self) -> Result<()> {
        let _: Value = self
            .send(self.request(reqwest::Method::GET, &format!("{}/collections", self.base_url)))
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
