//! Language model capability.
//!
//! The core consumes text generation as an opaque capability behind the
//! [`LanguageModel`] trait so agents can be exercised with mock models in
//! tests. [`OpenAiClient`] is the production implementation against any
//! OpenAI-compatible chat completions endpoint, with bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{AegisError, Result};

/// Opaque `generate(prompt) -> text` capability consumed by every agent.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce a completion. Transport or quota failures surface as
    /// [`AegisError::Upstream`]; the calling agent reports a failed phase,
    /// never a silent empty result.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: LlmConfig,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    async fn request_once(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| AegisError::Upstream(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AegisError::Upstream(format!(
                "completion endpoint returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AegisError::Upstream(format!("malformed completion response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AegisError::Upstream("completion response had no content".to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let mut attempts = 0;
        loop {
            match self.request_once(system, user, temperature, max_tokens).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(e);
                    }
                    let backoff = Duration::from_millis(500 * u64::from(attempts));
                    tracing::warn!(
                        attempt = attempts,
                        max = self.max_retries,
                        error = %e,
                        "completion failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Deterministic model shared by the agent, workflow, and control-plane
/// test suites.
#[cfg(test)]
pub(crate) struct CannedModel(pub &'static str);

#[cfg(test)]
#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, _: &str, _: &str, _: f64, _: u32) -> Result<String> {
        Ok(self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_model_round_trip() {
        let model = CannedModel("risk-adjusted outlook");
        let out = model.complete("sys", "user", 0.5, 256).await.unwrap();
        assert_eq!(out, "risk-adjusted outlook");
    }

    #[tokio::test]
    async fn test_with_max_retries_floor() {
        let client = OpenAiClient::new(LlmConfig::default()).with_max_retries(0);
        // A zero budget would never attempt the request at all.
        assert_eq!(client.max_retries, 1);

        let client = OpenAiClient::new(LlmConfig::default()).with_max_retries(5);
        assert_eq!(client.max_retries, 5);
    }
}
