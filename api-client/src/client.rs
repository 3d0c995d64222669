use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Error;
use crate::error::Result;
use crate::prompt::Prompt;
use crate::retry::RetryPolicy;
use crate::retry::retry;
use crate::sse::process_sse;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one [`ModelClient`]. Constructed explicitly by the
/// caller; there is no process-global client state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the OpenAI-compatible backend, without the trailing
    /// `/chat/completions` segment.
    pub base_url: String,
    /// Bearer credential. Not validated locally; the backend rejects an
    /// empty or invalid key.
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Output token cap. `None` leaves generation uncapped.
    pub max_output_tokens: Option<u64>,
    /// Per network call: request timeout in bulk mode, idle timeout between
    /// chunks in streamed mode. Retries each get a fresh budget.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.4,
            max_output_tokens: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions backend.
///
/// All entry points apply the configured retry policy to transient failures
/// (connection errors, timeouts, non-success statuses, mid-stream
/// interruptions) and surface everything else immediately.
pub struct ModelClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ModelClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|err| Error::Other(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http, config })
    }

    /// Bulk mode: one request, whole generation returned trimmed.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String> {
        retry(self.config.retry, |attempt| self.complete_once(prompt, attempt)).await
    }

    /// Streamed mode with aggregate return: deltas are accumulated and the
    /// full text returned trimmed. The entire attempt, including the drain,
    /// sits inside the retry loop.
    pub async fn complete_streamed(&self, prompt: &Prompt) -> Result<String> {
        retry(self.config.retry, |attempt| async move {
            let mut rx = self.start_stream(prompt, attempt).await?;
            let mut text = String::new();
            while let Some(delta) = rx.recv().await {
                text.push_str(&delta?);
            }
            Ok(text.trim().to_string())
        })
        .await
    }

    /// Streamed mode with immediate forwarding: each text delta is handed to
    /// `on_delta` synchronously as it arrives. Only the stream start is
    /// retried; once a delta has been forwarded, a failure surfaces as-is.
    pub async fn stream(
        &self,
        prompt: &Prompt,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> Result<()> {
        let mut rx = retry(self.config.retry, |attempt| {
            self.start_stream(prompt, attempt)
        })
        .await?;
        while let Some(delta) = rx.recv().await {
            on_delta(&delta?);
        }
        Ok(())
    }

    async fn complete_once(&self, prompt: &Prompt, attempt: u64) -> Result<String> {
        let response = self.send_request(prompt, attempt, false).await?;
        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let choice = parsed.choices.into_iter().next().ok_or(Error::MissingContent)?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }

    async fn start_stream(
        &self,
        prompt: &Prompt,
        attempt: u64,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let response = self.send_request(prompt, attempt, true).await?;
        let (tx_event, rx_event) = mpsc::channel(256);
        tokio::spawn(process_sse(
            response.bytes_stream(),
            tx_event,
            self.config.timeout,
        ));
        Ok(rx_event)
    }

    async fn send_request(
        &self,
        prompt: &Prompt,
        attempt: u64,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = self.request_body(prompt, stream);
        trace!(attempt, "POST to {url}: {body}");

        let mut builder = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        } else {
            // Streamed responses rely on the per-chunk idle timeout instead,
            // so a slow but live stream is not cut off mid-generation.
            builder = builder.timeout(self.config.timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UnexpectedStatus { status, body });
        }
        Ok(response)
    }

    fn request_body(&self, prompt: &Prompt, stream: bool) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.config.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}
