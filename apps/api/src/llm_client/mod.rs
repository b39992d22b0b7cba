/// LLM Client: the single point of entry for all completion API calls.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// Every prompt goes through `Completion::complete`, one HTTP call per attempt.
/// Retrying is the caller's job (see `retry`), so the policy is written once
/// for every provider.
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

pub mod prompts;
pub mod providers;
pub mod retry;

pub use providers::Provider;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Message fragments providers use when a request is throttled. Only consulted
/// when the status code alone does not say 429.
const RATE_LIMIT_MARKERS: &[&str] = &["quota", "rate limit", "resource_exhausted"];
const CONFIGURATION_MARKERS: &[&str] = &["not found", "api key"];

impl LlmError {
    /// True for throttling: HTTP 429 first, provider wording as a fallback.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::Api { status: 429, .. } => true,
            LlmError::Api { message, .. } => contains_any(message, RATE_LIMIT_MARKERS),
            _ => false,
        }
    }

    /// True when the credential, model name, or endpoint is wrong.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            LlmError::Api {
                status: 401 | 403 | 404,
                ..
            } => true,
            LlmError::Api { message, .. } => contains_any(message, CONFIGURATION_MARKERS),
            _ => false,
        }
    }
}

fn contains_any(message: &str, markers: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    markers.iter().any(|m| lowered.contains(m))
}

/// One completion attempt: prompt in, raw model text out.
///
/// Carried by the analyzer as `Arc<dyn Completion>`.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// HTTP client for the configured provider.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(config.timeout).build()?,
            config,
        })
    }

    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let provider = self.config.provider;
        let response = provider
            .request(&self.client, &self.config, prompt, system)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: providers::error_message(&body),
            });
        }

        let completion = provider.parse_response(&body)?;
        debug!(
            "LLM call succeeded: provider={:?}, input_tokens={:?}, output_tokens={:?}",
            provider, completion.input_tokens, completion.output_tokens
        );

        if completion.text.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(completion.text)
    }
}

/// Strips the code fences a model sometimes wraps around JSON, then
/// deserializes what is left.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(|s| s.trim())
                .unwrap_or(stripped)
        }
        None => text,
    }
}
