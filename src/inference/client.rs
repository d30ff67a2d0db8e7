//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests to the configured endpoint.
//! The agent loop talks to the model only through [`ModelBackend`], so tests
//! can substitute a scripted model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::response::parse_completion_response;
use super::types::{ChatCompletionRequest, ChatMessage, ModelTurn};
use crate::config::ModelConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ─── ModelBackend ────────────────────────────────────────────────────────────

/// A chat model that can answer with text or tool calls.
#[async_trait]
pub trait ModelBackend: Send {
    /// Send the transcript and the tool catalog; return the model's turn.
    async fn complete(
        &mut self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<ModelTurn, InferenceError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct InferenceClient {
    http: HttpClient,
    config: ModelConfig,
    api_key: Option<String>,
}

impl InferenceClient {
    /// Create a client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn new(config: ModelConfig) -> Result<Self, InferenceError> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| InferenceError::ConfigError {
                reason: format!("environment variable '{var}' (model API key) is not set"),
            })?),
            None => None,
        };

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Full URL of the chat completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<ModelTurn, InferenceError> {
        let url = self.endpoint();

        let body = ChatCompletionRequest {
            model: &self.config.model_name,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.config.request_timeout_secs,
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        parse_completion_response(&body_text)
    }
}

#[async_trait]
impl ModelBackend for InferenceClient {
    async fn complete(
        &mut self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<ModelTurn, InferenceError> {
        self.chat_completion(messages, tools).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
