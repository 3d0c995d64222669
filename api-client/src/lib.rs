//! Client for an OpenAI-compatible chat completions backend, with bounded
//! retry/backoff for transient failures and both bulk and streamed delivery.

mod client;
mod error;
mod prompt;
mod retry;
mod sse;

pub use client::ClientConfig;
pub use client::DEFAULT_MODEL;
pub use client::DEFAULT_TIMEOUT;
pub use client::ModelClient;
pub use error::Error;
pub use error::Result;
pub use prompt::Prompt;
pub use retry::RetryPolicy;
