//! HTTP completion backend.
//!
//! Anthropic is called through the Messages API; every other provider
//! through the OpenAI-compatible chat-completions API.
//!
//! POST {base_url}/chat/completions
//!   Authorization: Bearer {api_key}
//!
//! POST {base_url}/v1/messages
//!   x-api-key: {api_key}
//!   anthropic-version: 2023-06-01

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{CompletionBackend, CompletionRequest};
use crate::error::PipelineError;
use crate::models::{ApiStyle, LlmProvider, ModelConfig};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct HttpBackend {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: Option<String>,
    /// Per-call ceiling; expiry surfaces as an upstream error
    timeout: Duration,
    max_tokens: u32,
    /// Bounds in-flight calls; shared by every backend of one roster
    limiter: Arc<Semaphore>,
}

impl HttpBackend {
    pub fn new(config: ModelConfig) -> Self {
        let api_key = config.api_key();
        Self {
            client: reqwest::Client::builder()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
            api_key,
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            limiter: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, PipelineError> {
        self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Upstream(format!(
                "{} is not set",
                self.config.provider.api_key_env()
            ))
        })
    }

    async fn call_chat_completions(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/chat/completions", self.config.endpoint_base());
        let body = chat_completions_body(request, self.max_tokens);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .timeout(self.timeout)
            .json(&body);
        if self.config.provider == LlmProvider::OpenRouter {
            builder = builder
                .header("HTTP-Referer", "https://github.com/sitesmith")
                .header("X-Title", "Sitesmith");
        }

        let json = self.send(builder, &url).await?;
        extract_chat_content(&json).ok_or_else(|| {
            PipelineError::Upstream("Chat completion response carried no choices".to_string())
        })
    }

    async fn call_anthropic_messages(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/v1/messages", self.config.endpoint_base());
        let body = anthropic_messages_body(request, self.max_tokens);

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key()?)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
            .json(&body);

        let json = self.send(builder, &url).await?;
        extract_anthropic_content(&json).ok_or_else(|| {
            PipelineError::Upstream("Messages response carried no content blocks".to_string())
        })
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Value, PipelineError> {
        tracing::info!(url = %url, model = %self.config.model, "Calling completion API");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::Upstream(format!(
                    "Request timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else {
                PipelineError::Upstream(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::Upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(PipelineError::Upstream(format!(
                "API returned {}: {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| PipelineError::Upstream(format!("Failed to parse response JSON: {}", e)))
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PipelineError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| PipelineError::Upstream("Completion limiter closed".to_string()))?;

        match self.config.provider.api_style() {
            ApiStyle::ChatCompletions => self.call_chat_completions(&request).await,
            ApiStyle::AnthropicMessages => self.call_anthropic_messages(&request).await,
        }
    }
}

fn chat_completions_body(request: &CompletionRequest, max_tokens: u32) -> Value {
    json!({
        "model": request.model,
        "messages": [
            { "role": "system", "content": request.system_prompt },
            { "role": "user", "content": request.user_prompt }
        ],
        "temperature": request.temperature,
        "max_tokens": max_tokens
    })
}

fn anthropic_messages_body(request: &CompletionRequest, max_tokens: u32) -> Value {
    json!({
        "model": request.model,
        "max_tokens": max_tokens,
        "system": request.system_prompt,
        "temperature": request.temperature,
        "messages": [
            { "role": "user", "content": request.user_prompt }
        ]
    })
}

/// `choices[0].message.content`; a null content counts as empty text.
fn extract_chat_content(json: &Value) -> Option<String> {
    let message = json.get("choices")?.as_array()?.first()?.get("message")?;
    Some(
        message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string(),
    )
}

/// All `text` blocks of a Messages response, joined by newlines.
fn extract_anthropic_content(json: &Value) -> Option<String> {
    let blocks = json.get("content")?.as_array()?;
    Some(
        blocks
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a planner.".to_string(),
            user_prompt: "Plan a bakery site".to_string(),
            temperature: 0.2,
            model: "gpt-4o".to_string(),
        }
    }

    #[test]
    fn test_chat_body_shape() {
        let body = chat_completions_body(&request(), 1024);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Plan a bakery site");
        assert_eq!(body["max_tokens"], 1024);
    }

    #[test]
    fn test_anthropic_body_moves_system_prompt() {
        let body = anthropic_messages_body(&request(), 2048);
        assert_eq!(body["system"], "You are a planner.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_chat_content() {
        let json = json!({ "choices": [{ "message": { "content": "{\"a\":1}" } }] });
        assert_eq!(extract_chat_content(&json).as_deref(), Some("{\"a\":1}"));

        let null_content = json!({ "choices": [{ "message": { "content": null } }] });
        assert_eq!(extract_chat_content(&null_content).as_deref(), Some(""));

        assert!(extract_chat_content(&json!({ "error": "quota" })).is_none());
    }

    #[test]
    fn test_extract_anthropic_content() {
        let json = json!({
            "content": [
                { "type": "text", "text": "part one" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "part two" }
            ]
        });
        assert_eq!(
            extract_anthropic_content(&json).as_deref(),
            Some("part one\npart two")
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_is_upstream() {
        let backend = HttpBackend {
            api_key: None,
            ..HttpBackend::new(ModelConfig::with_provider(LlmProvider::Grok, "grok-2"))
        };
        let err = backend.complete(request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upstream(ref m) if m.contains("XAI_API_KEY")));
    }
}
