use std::time::Duration;

use triage_api_client::ClientConfig;
use triage_api_client::DEFAULT_MODEL;
use triage_api_client::DEFAULT_TIMEOUT;
use triage_api_client::RetryPolicy;

use crate::summary::DEFAULT_MAX_ITEMS;

/// Environment variables read by [`AnalyzerConfig::from_env`]. All optional;
/// the API key is not validated locally and an empty one is rejected by the
/// backend instead.
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MAX_ITEMS: &str = "TRIVY_MAX_ITEMS";
pub const ENV_STREAM: &str = "LLM_STREAM";
pub const ENV_MAX_TOKENS: &str = "LLM_MAX_TOKENS";

/// Explicit per-request configuration. Constructed once by the caller and
/// passed down; nothing in the pipeline reads process-global state.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    /// Cap on findings rendered into the prompt.
    pub max_items: usize,
    /// Streamed (aggregate) vs bulk delivery for the model query.
    pub stream: bool,
    /// Output token cap; `None` leaves generation uncapped.
    pub max_output_tokens: Option<u64>,
    pub temperature: f32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            base_url: client.base_url,
            max_items: DEFAULT_MAX_ITEMS,
            stream: false,
            max_output_tokens: None,
            temperature: client.temperature,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key/value source. Split out from
    /// [`Self::from_env`] so tests do not have to mutate the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            model: non_empty(lookup(ENV_MODEL)).unwrap_or(defaults.model),
            api_key: lookup(ENV_API_KEY).unwrap_or_default(),
            base_url: non_empty(lookup(ENV_BASE_URL)).unwrap_or(defaults.base_url),
            max_items: parse_positive(lookup(ENV_MAX_ITEMS))
                .map(|n| n as usize)
                .unwrap_or(defaults.max_items),
            stream: lookup(ENV_STREAM)
                .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_output_tokens: parse_positive(lookup(ENV_MAX_TOKENS)),
            temperature: defaults.temperature,
            timeout: defaults.timeout,
            retry: defaults.retry,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            timeout: self.timeout,
            retry: self.retry,
        }
    }
}

/// Parse an optional integer setting. Empty, unparsable, zero, or negative
/// values all disable the setting.
fn parse_positive(raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(value) if value > 0 => Some(value as u64),
        _ => None,
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}
