//! Configuration management for Mandolin services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! The loaded `AppConfig` is read-only: binaries build it once, wrap it in
//! an `Arc` and hand the relevant sections to component constructors.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Text generation configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Query pipeline tunables
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Page indexing configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: gemini, openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    /// Backend: qdrant, memory
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    /// Qdrant REST URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Optional Qdrant API key
    pub api_key: Option<String>,

    /// Collection holding the indexed pages
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Generation provider: anthropic, openai, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Tunables of the agentic query pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Retries after the first attempt when a draft is ungrounded
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retrieval requests `overfetch_factor * max_citations` candidates
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Cross-reference citations appended per document type per identifier
    #[serde(default = "default_citations_per_type")]
    pub citations_per_type: usize,

    /// Citations enumerated as numbered sources in the prompt
    #[serde(default = "default_prompt_citations")]
    pub prompt_citations: usize,

    /// Characters of indexed content kept in a citation snippet
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Exact-match scan limit per component identifier
    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: usize,

    /// Generation budget per draft
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Pages embedded concurrently
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,

    /// Points per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 120 }
fn default_max_concurrent() -> usize { 64 }
fn default_embedding_provider() -> String { "gemini".to_string() }
fn default_embedding_model() -> String { "models/embedding-001".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_vector_backend() -> String { "qdrant".to_string() }
fn default_qdrant_url() -> String { "http://localhost:6333".to_string() }
fn default_collection() -> String { "mandolin_documents".to_string() }
fn default_vector_timeout() -> u64 { 10 }
fn default_llm_provider() -> String { "anthropic".to_string() }
fn default_llm_model() -> String { "claude-sonnet-4-20250514".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 2 }
fn default_overfetch_factor() -> usize { 2 }
fn default_citations_per_type() -> usize { 2 }
fn default_prompt_citations() -> usize { 10 }
fn default_snippet_chars() -> usize { 500 }
fn default_lookup_limit() -> usize { 50 }
fn default_max_tokens() -> usize { 1000 }
fn default_embed_concurrency() -> usize { 8 }
fn default_upsert_batch_size() -> usize { 64 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "mandolin".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__VECTOR_STORE__URL=http://qdrant:6333
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Fully in-process configuration: mock embeddings, in-memory index and
    /// a canned generator. Used by tests and offline development.
    pub fn offline() -> Self {
        let mut config = Self::default();
        config.embedding.provider = "mock".to_string();
        config.vector_store.backend = "memory".to_string();
        config.llm.provider = "mock".to_string();
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            ingestion: IngestionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection(),
            timeout_secs: default_vector_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            overfetch_factor: default_overfetch_factor(),
            citations_per_type: default_citations_per_type(),
            prompt_citations: default_prompt_citations(),
            snippet_chars: default_snippet_chars(),
            lookup_limit: default_lookup_limit(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            embed_concurrency: default_embed_concurrency(),
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}
