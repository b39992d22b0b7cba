//! Wire formats for the supported completion providers.
//!
//! Each provider differs only in URL, auth header, and JSON shape; the
//! transport and retry handling in `LlmClient` are shared.

use std::str::FromStr;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LlmError;
use crate::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
}

#[derive(Debug, Error)]
#[error("Unknown LLM_PROVIDER '{0}' (expected gemini, openai, or anthropic)")]
pub struct UnknownProvider(String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Text and token usage pulled out of a successful provider response.
#[derive(Debug)]
pub struct CompletionText {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl Provider {
    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.0-flash",
            Provider::OpenAi => "gpt-3.5-turbo",
            Provider::Anthropic => "claude-sonnet-4-5",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }

    /// Builds the single HTTP request for one completion attempt.
    pub(super) fn request(
        self,
        client: &Client,
        config: &LlmConfig,
        prompt: &str,
        system: &str,
    ) -> RequestBuilder {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(self.default_base_url())
            .trim_end_matches('/');

        match self {
            Provider::Gemini => client
                .post(format!(
                    "{base}/v1beta/models/{}:generateContent",
                    config.model
                ))
                .header("x-goog-api-key", &config.api_key)
                .json(&GeminiRequest {
                    system_instruction: GeminiContent {
                        role: None,
                        parts: vec![GeminiPart { text: system }],
                    },
                    contents: vec![GeminiContent {
                        role: Some("user"),
                        parts: vec![GeminiPart { text: prompt }],
                    }],
                    generation_config: GeminiGenerationConfig {
                        temperature: TEMPERATURE,
                        max_output_tokens: MAX_TOKENS,
                    },
                }),
            Provider::OpenAi => client
                .post(format!("{base}/v1/chat/completions"))
                .bearer_auth(&config.api_key)
                .json(&OpenAiRequest {
                    model: &config.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                    temperature: TEMPERATURE,
                    max_tokens: MAX_TOKENS,
                }),
            Provider::Anthropic => client
                .post(format!("{base}/v1/messages"))
                .header("x-api-key", &config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest {
                    model: &config.model,
                    max_tokens: MAX_TOKENS,
                    system,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                }),
        }
    }

    /// Extracts the model text from a 2xx response body.
    pub(super) fn parse_response(self, body: &str) -> Result<CompletionText, LlmError> {
        match self {
            Provider::Gemini => {
                let response: GeminiResponse = serde_json::from_str(body)?;
                let text = response
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content)
                    .map(|content| {
                        content
                            .parts
                            .into_iter()
                            .filter_map(|p| p.text)
                            .collect::<String>()
                    })
                    .ok_or(LlmError::EmptyContent)?;
                let usage = response.usage_metadata;
                Ok(CompletionText {
                    text,
                    input_tokens: usage.as_ref().and_then(|u| u.prompt_token_count),
                    output_tokens: usage.as_ref().and_then(|u| u.candidates_token_count),
                })
            }
            Provider::OpenAi => {
                let response: OpenAiResponse = serde_json::from_str(body)?;
                let text = response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or(LlmError::EmptyContent)?;
                Ok(CompletionText {
                    text,
                    input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
                    output_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
                })
            }
            Provider::Anthropic => {
                let response: AnthropicResponse = serde_json::from_str(body)?;
                let text = response
                    .content
                    .into_iter()
                    .find(|b| b.block_type == "text")
                    .and_then(|b| b.text)
                    .ok_or(LlmError::EmptyContent)?;
                Ok(CompletionText {
                    text,
                    input_tokens: response.usage.as_ref().map(|u| u.input_tokens),
                    output_tokens: response.usage.as_ref().map(|u| u.output_tokens),
                })
            }
        }
    }
}

/// Pulls a readable message out of a provider error body. All three providers
/// nest it under `error.message`; Gemini adds a symbolic `error.status`.
pub(super) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ProviderError>(body) {
        Ok(ProviderError { error }) => match error.status {
            Some(status) => format!("{status}: {}", error.message),
            None => error.message,
        },
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// ── Gemini ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

// ── OpenAI ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Anthropic ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_aliases() {
        assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("mistral".parse::<Provider>().is_err());
    }

    #[test]
    fn test_error_message_includes_gemini_status() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "RESOURCE_EXHAUSTED: Quota exceeded");
    }

    #[test]
    fn test_error_message_openai_shape() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":null}}"#;
        assert_eq!(error_message(body), "Rate limit reached");
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn test_gemini_without_candidates_is_empty_content() {
        let err = Provider::Gemini
            .parse_response(r#"{"candidates":[]}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[test]
    fn test_openai_null_content_is_empty_content() {
        let err = Provider::OpenAi
            .parse_response(r#"{"choices":[{"message":{"content":null}}]}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[test]
    fn test_anthropic_skips_non_text_blocks() {
        let body = r#"{"content":[{"type":"thinking"},{"type":"text","text":"answer"}]}"#;
        let completion = Provider::Anthropic.parse_response(body).unwrap();
        assert_eq!(completion.text, "answer");
        assert!(completion.input_tokens.is_none());
    }
}
