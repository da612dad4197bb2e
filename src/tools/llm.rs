// LLM provider contract and clients

//! # LLM Client
//!
//! The core never depends on provider-specific features beyond JSON-mode-like
//! structured output. A request is (system prompt, user prompt, temperature,
//! max tokens); a response is raw text the calling tool parses. Parser errors
//! never cross a tool boundary: each tool has a documented fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::{Result, TriageError};

/// A single completion request to the model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

/// Core trait every LLM provider client must implement
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a completion request and return the raw response text.
    async fn complete(&self, request: &LlmRequest) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
///
/// Works against any provider exposing the `/v1/chat/completions` shape with
/// bearer-token auth, which is the least common denominator the tools need.
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriageError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TriageError::Timeout(format!("LLM request timed out: {}", e))
                } else {
                    TriageError::TransientIo(format!("LLM request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &text, "LLM provider"));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TriageError::ParseError(format!("malformed completion envelope: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TriageError::ParseError("completion had no choices".to_string()))
    }
}

/// Map an HTTP failure status to the transient/permanent error taxonomy.
/// 429 and every 5xx retry with backoff; other 4xx are permanent.
pub fn classify_http_failure(
    status: reqwest::StatusCode,
    body: &str,
    system: &str,
) -> TriageError {
    let detail = format!("{} returned {}: {}", system, status, body);
    if status.as_u16() == 429 {
        TriageError::RateLimited(detail)
    } else if status.is_server_error() {
        TriageError::TransientIo(detail)
    } else {
        TriageError::PermanentIo(detail)
    }
}

/// Deterministic scripted client for tests and offline development.
///
/// Pops one canned response per call; when the script runs dry every further
/// call fails with a transient error, which exercises the fallback paths.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    repeat: Option<String>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            repeat: None,
        }
    }

    /// A client that always returns the same response.
    pub fn repeating(response: &str) -> Self {
        let mut scripted = Self::new(vec![]);
        scripted.repeat = Some(response.to_string());
        scripted
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: &LlmRequest) -> Result<String> {
        if let Some(fixed) = &self.repeat {
            return Ok(fixed.clone());
        }
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| TriageError::TransientIo("scripted responses exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_pops_in_order() {
        let llm = ScriptedLlm::new(vec!["first", "second"]);
        let req = LlmRequest::new("sys", "user");
        assert_eq!(llm.complete(&req).await.unwrap(), "first");
        assert_eq!(llm.complete(&req).await.unwrap(), "second");
        assert!(llm.complete(&req).await.is_err());
    }

    #[test]
    fn http_failures_classify_into_the_error_taxonomy() {
        use reqwest::StatusCode;
        assert!(matches!(
            classify_http_failure(StatusCode::TOO_MANY_REQUESTS, "", "pms"),
            TriageError::RateLimited(_)
        ));
        assert!(matches!(
            classify_http_failure(StatusCode::BAD_GATEWAY, "", "pms"),
            TriageError::TransientIo(_)
        ));
        assert!(matches!(
            classify_http_failure(StatusCode::UNAUTHORIZED, "", "pms"),
            TriageError::PermanentIo(_)
        ));
    }
}
