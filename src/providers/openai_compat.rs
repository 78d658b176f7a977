//! Adapter for OpenAI-compatible chat completion endpoints.
//!
//! Groq and Alibaba DashScope (Qwen) both expose `/chat/completions` with
//! the OpenAI request shape, so one client covers every configured
//! provider. Built-in [`Preset`]s supply base URLs and defaults for the keys
//! the assistant ships with.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{ProviderAdapter, ProviderInfo};
use crate::types::AnalyzeOptions;
use crate::{CallFailure, CuecardError, Result};

/// Default request timeout for remote completions.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Built-in provider defaults.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub key: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub model: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: &'static str,
}

/// Groq: fast and cheap, the default provider and the summarizer.
pub const GROQ: Preset = Preset {
    key: "groq",
    name: "Groq",
    base_url: "https://api.groq.com/openai/v1",
    model: "qwen/qwen3-32b",
    max_tokens: 20000,
    temperature: 0.7,
    api_key_env: "GROQ_API_KEY",
};

/// Qwen via DashScope compatible mode: stronger but token-expensive.
pub const QWEN: Preset = Preset {
    key: "qwen",
    name: "Qwen",
    base_url: "https://dashscope-intl.aliyuncs.com/compatible-mode/v1",
    model: "qwen3-max-2025-09-23",
    max_tokens: 4000,
    temperature: 0.7,
    api_key_env: "DASHSCOPE_API_KEY",
};

/// Look up the built-in preset for a provider key.
pub fn preset(key: &str) -> Option<&'static Preset> {
    [&GROQ, &QWEN].into_iter().find(|p| p.key == key)
}

/// Client for one OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    key: String,
    info: ProviderInfo,
    api_key: String,
    http: Client,
    base_url: String,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("key", &self.key)
            .field("info", &self.info)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatClient {
    /// Create a client registered under `key` with the default timeout.
    pub fn new(
        key: impl Into<String>,
        info: ProviderInfo,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::with_timeout(key, info, api_key, base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        key: impl Into<String>,
        info: ProviderInfo,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            CuecardError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            key: key.into(),
            info,
            api_key: api_key.into(),
            http,
            base_url: base_url.into(),
        })
    }

    /// Registry key this client reports failures under.
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn complete(
        &self,
        prompt: &str,
        options: &AnalyzeOptions,
    ) -> std::result::Result<String, CallFailure> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatCompletionRequest {
            model: &self.info.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            max_tokens: options.max_tokens.unwrap_or(self.info.max_tokens),
            temperature: options.temperature.unwrap_or(self.info.temperature),
        };

        debug!(
            provider = %self.key,
            model = %self.info.model,
            prompt_chars = prompt.chars().count(),
            max_tokens = request.max_tokens,
            "sending completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CallFailure::Decode(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CallFailure::EmptyResponse)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatClient {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn analyze(&self, prompt: &str, options: &AnalyzeOptions) -> Result<String> {
        let outcome = match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(CallFailure::Cancelled),
                result = self.complete(prompt, options) => result,
            },
            None => self.complete(prompt, options).await,
        };
        outcome.map_err(|reason| CuecardError::call_failed(&self.key, reason))
    }
}

/// Map non-success statuses to call failures.
async fn check_status(response: Response) -> std::result::Result<Response, CallFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(CallFailure::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(CallFailure::RateLimited { retry_after })
        }
        code => {
            let message = response.text().await.unwrap_or_default();
            Err(CallFailure::Api {
                status: code,
                message,
            })
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_resolve_by_key() {
        assert_eq!(preset("groq").map(|p| p.api_key_env), Some("GROQ_API_KEY"));
        assert_eq!(preset("qwen").map(|p| p.max_tokens), Some(4000));
        assert!(preset("openai").is_none());
    }

    #[test]
    fn request_serializes_in_openai_shape() {
        let request = ChatCompletionRequest {
            model: "m",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: false,
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["stream"], false);
        assert_eq!(json["max_tokens"], 10);
    }
}
