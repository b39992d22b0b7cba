use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::Provider;

/// 10 MB, the largest resume the upload endpoints accept.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Settings for the single completion endpoint the analyzer talks to.
#[derive(Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's public base URL (proxies, tests).
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if the selected provider's API key is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub retry: RetryPolicy,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so callers
    /// (and tests) never have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider: Provider = lookup("LLM_PROVIDER")
            .unwrap_or_else(|| "gemini".to_string())
            .parse()?;

        let api_key = require(&lookup, provider.api_key_var())?;
        let model = lookup("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_or(&lookup, "RETRY_MAX_RETRIES", defaults.max_retries)?,
            initial_delay: Duration::from_millis(parse_or(
                &lookup,
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )?),
        };

        Ok(Config {
            llm: LlmConfig {
                provider,
                api_key,
                model,
                base_url: lookup("LLM_BASE_URL").filter(|url| !url.trim().is_empty()),
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "LLM_TIMEOUT_SECS",
                    DEFAULT_LLM_TIMEOUT_SECS,
                )?),
            },
            retry,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => bail!("Required environment variable '{key}' is empty"),
        None => bail!("Required environment variable '{key}' is not set"),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
