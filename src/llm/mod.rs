//! LLM client for skill generation and reflective mutation.
//!
//! Talks to any OpenAI-compatible chat completions endpoint (OpenRouter by
//! default). The rest of the crate depends only on the [`LlmProvider`]
//! trait so tests can substitute deterministic stubs.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Default chat completions endpoint.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier to use for generation.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0). Higher values = more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Generated message.
    pub message: Message,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for OpenRouter and other OpenAI-compatible endpoints.
pub struct OpenRouterClient {
    api_base: String,
    api_key: String,
    http_client: Client,
}

impl OpenRouterClient {
    /// Create a new client with explicit configuration.
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create a client from the environment.
    ///
    /// Reads `OPENROUTER_API_KEY` (required) and `OPENROUTER_API_BASE`
    /// (defaults to the public OpenRouter endpoint).
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_env_with_base(None)
    }

    /// Create a client from the environment with an optional base URL
    /// override, for pointing at local OpenAI-compatible endpoints.
    ///
    /// Precedence: `base_override` > `OPENROUTER_API_BASE` > the public
    /// OpenRouter endpoint.
    pub fn from_env_with_base(base_override: Option<&str>) -> Result<Self, LlmError> {
        let api_key = env::var("OPENROUTER_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let api_base = base_override
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| env::var("OPENROUTER_API_BASE").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Ok(Self::new(api_base, api_key))
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl LlmProvider for OpenRouterClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message: body,
            });
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        if parsed.first_content().map(str::trim).unwrap_or_default().is_empty() {
            return Err(LlmError::EmptyResponse {
                model: request.model,
            });
        }
        Ok(parsed)
    }
}
