//! Language-model client for OpenAI-compatible chat completion APIs.
//!
//! One bounded request/response call per question. The mediator composes
//! the prompt; this client only transports it, requests a JSON object
//! response, and maps transport failures to distinct error variants so the
//! mediator can degrade.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM integration disabled")]
    Disabled,

    #[error("LLM API key not configured")]
    MissingApiKey,

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM response parsing error: {0}")]
    ParseError(String),

    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),
}

/// Structured answer the mediator expects back from the model.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmAnswer {
    pub answer: String,
    #[serde(default, alias = "chartType")]
    pub chart_type: Option<String>,
}

/// Seam for testing and alternative providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn is_available(&self) -> bool;

    /// One chat completion returning a JSON object `{answer, chart_type}`.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
    -> Result<LlmAnswer, LlmError>;
}

pub struct LlmClient {
    http_client: Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if config.enabled && api_key.is_none() {
            tracing::warn!(
                "LLM enabled but {} is not set; questions will fall back to local analysis only",
                config.api_key_env
            );
        }
        Self { http_client, config, api_key }
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn is_available(&self) -> bool {
        self.config.enabled && self.api_key.is_some()
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmAnswer, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            response_format: Some(ResponseFormat { r#type: "json_object".to_string() }),
        };

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        tracing::debug!("Calling LLM API {} with model {}", url, self.config.model);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_secs)
                } else {
                    LlmError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| LlmError::ParseError("empty response from LLM".to_string()))?;

        // A malformed or non-JSON body is "no answer", never a crash.
        serde_json::from_str(content)
            .map_err(|e| LlmError::ParseError(format!("unparseable LLM response: {}", e)))
    }
}

// ============================================================================
// OpenAI API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
