use serde::Serialize;

use crate::finding::Finding;
use crate::finding::Severity;

/// Per-severity counts over the deduplicated finding set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "UNKNOWN")]
    pub unknown: usize,
    pub total: usize,
}

/// Aggregate metrics for one request. Serializes to the flat JSON object the
/// prompt embeds: `{"error":1}` when the report was unreadable, `{"total":0}`
/// for a clean report, and the full severity map otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Metrics {
    ReadError { error: u8 },
    Empty { total: usize },
    Counts(SeverityCounts),
}

impl Metrics {
    pub fn read_error() -> Self {
        Metrics::ReadError { error: 1 }
    }

    /// Derive metrics from the deduplicated finding set.
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.is_empty() {
            return Metrics::Empty { total: 0 };
        }
        let mut counts = SeverityCounts::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unknown => counts.unknown += 1,
            }
        }
        counts.total = findings.len();
        Metrics::Counts(counts)
    }

    pub fn total(&self) -> usize {
        match self {
            Metrics::ReadError { .. } => 0,
            Metrics::Empty { total } => *total,
            Metrics::Counts(counts) => counts.total,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Metrics::ReadError { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
