//! Summarize a container image vulnerability scan report and query a
//! language-model backend for a structured remediation report.
//!
//! Data flows strictly downward: report parsing, dedup/ranking, metrics
//! aggregation, bounded rendering, prompt construction, and the model query,
//! with an async runner delivering the final text via a completion callback.

mod analyzer;
mod config;
mod dedup;
mod finding;
mod metrics;
mod prompt;
mod report;
mod summary;

pub use analyzer::AnalysisError;
pub use analyzer::model_report;
pub use analyzer::run_analysis;
pub use analyzer::spawn_analysis;
pub use analyzer::spawn_with_callback;
pub use analyzer::stream_model_report;
pub use config::AnalyzerConfig;
pub use config::ENV_API_KEY;
pub use config::ENV_BASE_URL;
pub use config::ENV_MAX_ITEMS;
pub use config::ENV_MAX_TOKENS;
pub use config::ENV_MODEL;
pub use config::ENV_STREAM;
pub use dedup::dedupe_and_rank;
pub use finding::Finding;
pub use finding::Severity;
pub use metrics::Metrics;
pub use metrics::SeverityCounts;
pub use prompt::PROMPT_VERSION;
pub use prompt::build_prompt;
pub use report::ReportError;
pub use report::parse_report;
pub use summary::DEFAULT_MAX_ITEMS;
pub use summary::NO_FINDINGS_MESSAGE;
pub use summary::READ_ERROR_MESSAGE;
pub use summary::Summary;
pub use summary::SummaryKind;
pub use summary::summarize_report;
