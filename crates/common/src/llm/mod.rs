//! Text generation clients
//!
//! The query pipeline treats generation as a single blocking
//! `complete(prompt, max_tokens)` call. Supported backends:
//! - Anthropic Messages API
//! - OpenAI-compatible chat completions
//! - A canned mock for offline development

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Trait for text generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt, returning the generated text
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Generation {
            message: format!("LLM API error {}: {}", status, body),
        });
    }

    response.json().await.map_err(|e| AppError::Generation {
        message: format!("Failed to parse LLM response: {}", e),
    })
}

/// Anthropic Messages API client
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicGenerator {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        })
    }

    async fn make_request(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("LLM API request failed: {}", e),
            })?;

        let body: MessagesResponse = read_json(response).await?;

        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(AppError::Generation {
                message: "Empty response from LLM".to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let start = Instant::now();
        let result = self.make_request(prompt, max_tokens).await;
        metrics::record_generation(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI-compatible chat completions client
pub struct OpenAIChatGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIChatGenerator {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    async fn make_request(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("LLM API request failed: {}", e),
            })?;

        let body: ChatResponse = read_json(response).await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from LLM".to_string(),
            })
    }
}

#[async_trait]
impl TextGenerator for OpenAIChatGenerator {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let start = Instant::now();
        let result = self.make_request(prompt, max_tokens).await;
        metrics::record_generation(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock generator for development without API keys.
///
/// Always answers from the first numbered source, so drafts pass the
/// groundedness check whenever evidence exists.
pub struct MockGenerator;

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn complete(&self, prompt: &str, _max_tokens: usize) -> Result<String> {
        let question = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or("the question")
            .trim();

        Ok(format!(
            "The uploaded documents address {} in [Source 1]. \
            [Mock response - LLM API key not configured]",
            question
        ))
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Create a text generator based on configuration
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    let require_key = || {
        config.api_key.clone().filter(|k| !k.is_empty()).ok_or_else(|| {
            AppError::Configuration {
                message: format!("llm provider '{}' requires an API key", config.provider),
            }
        })
    };

    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicGenerator::new(config, require_key()?)?)),
        "openai" => Ok(Arc::new(OpenAIChatGenerator::new(config, require_key()?)?)),
        "mock" => Ok(Arc::new(MockGenerator)),
        other => Err(AppError::Configuration {
            message: format!("unknown llm provider '{}'", other),
        }),
    }
}
