use std::path::Path;

use tracing::warn;

use crate::dedup::dedupe_and_rank;
use crate::finding::Finding;
use crate::metrics::Metrics;
use crate::report::parse_report;

/// Bound on findings rendered into the prompt, keeping prompt size flat
/// regardless of report size.
pub const DEFAULT_MAX_ITEMS: usize = 50;

pub const READ_ERROR_MESSAGE: &str = "Error reading the scan results file.";
pub const NO_FINDINGS_MESSAGE: &str = "No vulnerabilities were found in the image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// At least one deduplicated finding; `text` holds the rendered lines.
    Findings,
    /// Valid report with nothing in it. Not an error; the model is still
    /// queried so it can offer general guidance.
    NoFindings,
    /// The report file was missing, unreadable, or not JSON. The pipeline
    /// must not proceed to the model query.
    ReadError,
}

/// Output of the summarization stage: the bounded rendered finding list and
/// the full metrics, available to a caller before the model is queried.
#[derive(Debug, Clone)]
pub struct Summary {
    pub kind: SummaryKind,
    pub text: String,
    pub metrics: Metrics,
}

/// Read a scan report and reduce it to a bounded, deduplicated,
/// severity-ranked summary. Never fails: read and parse problems surface as
/// a [`SummaryKind::ReadError`] summary with `{error:1}` metrics.
pub fn summarize_report(path: &Path, max_items: usize) -> Summary {
    let raw = match parse_report(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("could not summarize {}: {err}", path.display());
            return Summary {
                kind: SummaryKind::ReadError,
                text: READ_ERROR_MESSAGE.to_string(),
                metrics: Metrics::read_error(),
            };
        }
    };

    if raw.is_empty() {
        return Summary {
            kind: SummaryKind::NoFindings,
            text: NO_FINDINGS_MESSAGE.to_string(),
            metrics: Metrics::from_findings(&[]),
        };
    }

    let ranked = dedupe_and_rank(raw);
    let metrics = Metrics::from_findings(&ranked);
    let lines: Vec<String> = ranked.iter().take(max_items).map(render_line).collect();

    Summary {
        kind: SummaryKind::Findings,
        text: lines.join("\n"),
        metrics,
    }
}

fn render_line(finding: &Finding) -> String {
    format!(
        "{} | {} | {} | {}",
        finding.id, finding.package, finding.severity, finding.title
    )
}
