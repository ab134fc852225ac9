//! Content generation client
//!
//! [`LlmClient`] talks to the external text-generation service (Anthropic
//! Messages API or a local Ollama server). [`ContentGenerator`] wraps any
//! [`TextGenerator`] with prompt construction, the parse fallback ladder and
//! post-processing, so callers always receive a valid [`ContentArtifact`]
//! or a typed [`GenerationError`] for service failures.
//!
//! ```text
//!   topic ──▶ prompt ──▶ TextGenerator ──▶ parse ladder ──▶ postprocess ──▶ artifact
//!                             ▲                 │
//!                             └── strict retry ─┘ (prose or code payloads)
//! ```
//!
//! [`ContentArtifact`]: crate::models::ContentArtifact

pub mod generator;
pub mod parse;
pub mod postprocess;
pub mod prompt;

pub use generator::ContentGenerator;
pub use parse::ParseResult;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Failures of the generation service that reach the orchestrator
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Network failure, timeout, rate limit or 5xx
    #[error("transient generation failure: {0}")]
    Transient(String),

    /// The service refused the request (auth, quota, bad request)
    #[error("generation rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The service answered with an envelope we cannot decode
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generator misconfigured: {0}")]
    Config(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(format!("status {status}: {body}"))
        } else {
            Self::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, err.to_string())
        } else {
            // timeouts, connection resets, DNS
            Self::Transient(err.to_string())
        }
    }
}

// ============================================================================
// Generator boundary
// ============================================================================

/// Outbound call: system profile text plus user prompt text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Raw text completion service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs and metrics
    fn name(&self) -> &str;

    /// Return the free text produced for `request`
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

pub type SharedGenerator = Arc<dyn TextGenerator>;

// ============================================================================
// Configuration
// ============================================================================

/// Which HTTP API the client speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Configuration for the generation client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,

    /// Base URL of the service
    pub endpoint: String,

    pub model: String,

    /// API key (Anthropic only); usually supplied through `ANTHROPIC_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            endpoint: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            api_key: None,
            timeout_secs: 120,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// Config for a local Ollama server
    pub fn ollama(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let provider = std::env::var("DAILYPRESS_LLM_PROVIDER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.provider);

        let (endpoint, model) = match provider {
            LlmProvider::Anthropic => (
                std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.endpoint),
                std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.model),
            ),
            LlmProvider::Ollama => (
                std::env::var("OLLAMA_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "qwen2.5:7b".to_string()),
            ),
        };

        Self {
            provider,
            endpoint,
            model,
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            timeout_secs: std::env::var("DAILYPRESS_LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_tokens: std::env::var("DAILYPRESS_LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: std::env::var("DAILYPRESS_LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint)
            .with_context(|| format!("invalid endpoint '{}'", self.endpoint))?;
        if self.model.trim().is_empty() {
            anyhow::bail!("model must not be empty");
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            anyhow::bail!("temperature must be within 0.0..=1.0");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

// ============================================================================
// HTTP client
// ============================================================================

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// HTTP client for the generation service
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn with_config(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::with_config(LlmConfig::from_env())
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the service answers at all
    pub async fn is_available(&self) -> bool {
        let url = match self.config.provider {
            LlmProvider::Ollama => format!("{}/api/tags", self.config.endpoint),
            LlmProvider::Anthropic => format!("{}/v1/models", self.config.endpoint),
        };
        self.client.get(&url).send().await.is_ok()
    }

    async fn complete_anthropic(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::Config("ANTHROPIC_API_KEY is not set".into()))?;

        let url = format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'));
        let body = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: &request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status, body));
        }

        let parsed: AnthropicResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }

    async fn complete_ollama(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let body = OllamaRequest {
            model: &self.config.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::from_status(status, body));
        }

        let parsed: OllamaResponse = response.json().await?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn name(&self) -> &str {
        match self.config.provider {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        tracing::debug!(
            provider = self.name(),
            model = %self.config.model,
            prompt_chars = request.prompt.chars().count(),
            "Calling generation service"
        );
        match self.config.provider {
            LlmProvider::Anthropic => self.complete_anthropic(request).await,
            LlmProvider::Ollama => self.complete_ollama(request).await,
        }
    }
}
