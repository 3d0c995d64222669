use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::path::PathBuf;

use futures::FutureExt;
use thiserror::Error;
use tracing::error;
use triage_api_client::ModelClient;
use triage_api_client::Prompt;

use crate::config::AnalyzerConfig;
use crate::prompt::build_prompt;
use crate::summary::Summary;
use crate::summary::SummaryKind;
use crate::summary::summarize_report;

/// Failures past the summarization stage. The summarization stage itself
/// never fails (see [`summarize_report`]); everything here is stringified at
/// the callback boundary so the caller always receives exactly one text
/// value per request.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Backend(#[from] triage_api_client::Error),
    #[error("{0}")]
    Task(String),
}

impl AnalysisError {
    /// Render the taxonomy into the user-visible diagnostic string. Each
    /// class keeps a stable prefix so callers (and tests) can tell them
    /// apart without string matching on the underlying error.
    pub fn diagnostic(&self) -> String {
        match self {
            AnalysisError::Backend(triage_api_client::Error::RetryLimit { last, .. }) => {
                format!("Error querying the model (retries exhausted): {last}")
            }
            AnalysisError::Backend(err) => format!("Error querying the model: {err}"),
            AnalysisError::Task(message) => format!("Error during analysis: {message}"),
        }
    }
}

/// Query the model for a remediation report, honoring the configured
/// delivery mode. Always returns text: the model's answer on success, a
/// diagnostic string on unrecoverable failure.
pub async fn model_report(config: &AnalyzerConfig, summary: &Summary) -> String {
    let prompt = build_prompt(summary);
    let result = async {
        let client = ModelClient::new(config.client_config())?;
        if config.stream {
            client.complete_streamed(&prompt).await
        } else {
            client.complete(&prompt).await
        }
    }
    .await;

    match result {
        Ok(text) => text,
        Err(err) => {
            error!("model query failed: {err}");
            AnalysisError::Backend(err).diagnostic()
        }
    }
}

/// Streaming variant for interactive consumers: each text delta is forwarded
/// to `on_delta` from the background execution context as it arrives. The
/// sink must be safe to call off the caller's context.
pub async fn stream_model_report(
    config: &AnalyzerConfig,
    summary: &Summary,
    on_delta: &mut (dyn FnMut(&str) + Send),
) -> Result<(), AnalysisError> {
    let prompt: Prompt = build_prompt(summary);
    let client = ModelClient::new(config.client_config()).map_err(AnalysisError::Backend)?;
    client
        .stream(&prompt, on_delta)
        .await
        .map_err(AnalysisError::Backend)
}

/// Run the whole pipeline — parse, dedupe, aggregate, render, prompt, query
/// — and always come back with one string. A read error short-circuits
/// before the model query; an empty report still queries the model for
/// general guidance.
pub async fn run_analysis(config: &AnalyzerConfig, report_path: &Path) -> String {
    let summary = summarize_report(report_path, config.max_items);
    if summary.kind == SummaryKind::ReadError {
        return summary.text;
    }
    model_report(config, &summary).await
}

/// Execute [`run_analysis`] on a background task and deliver the result via
/// `callback`, invoked exactly once with a string for any input. Panics
/// inside the pipeline are caught and delivered through the same path; the
/// caller is responsible for marshaling the callback onto its own execution
/// context if needed.
pub fn spawn_analysis<F>(
    config: AnalyzerConfig,
    report_path: PathBuf,
    callback: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnOnce(String) + Send + 'static,
{
    spawn_with_callback(
        async move { run_analysis(&config, &report_path).await },
        callback,
    )
}

/// Run `task` on a background tokio task and hand its text to `callback`,
/// invoked exactly once. A panicking task is caught and rendered through the
/// same diagnostic path instead of escaping silently.
pub fn spawn_with_callback<Fut, F>(task: Fut, callback: F) -> tokio::task::JoinHandle<()>
where
    Fut: Future<Output = String> + Send + 'static,
    F: FnOnce(String) + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(task)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| AnalysisError::Task(panic_message(panic)).diagnostic());
        callback(outcome);
    })
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "background task panicked".to_string()
    }
}
