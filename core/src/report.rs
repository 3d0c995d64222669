use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::finding::Finding;
use crate::finding::Severity;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to read scan report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scan report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Subset of the scanner's JSON output the pipeline consumes. Everything
/// else in the document is ignored.
#[derive(Deserialize)]
struct ScanReport {
    #[serde(rename = "Results", default)]
    results: Vec<ScanResult>,
}

#[derive(Deserialize)]
struct ScanResult {
    // Trivy emits `null` instead of an empty array for clean targets.
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Option<Vec<RawVulnerability>>,
}

#[derive(Deserialize)]
struct RawVulnerability {
    #[serde(rename = "VulnerabilityID", default)]
    vulnerability_id: Option<String>,
    #[serde(rename = "PkgName", default)]
    pkg_name: Option<String>,
    #[serde(rename = "Severity", default)]
    severity: Option<String>,
    #[serde(rename = "Title", default)]
    title: Option<String>,
}

impl From<RawVulnerability> for Finding {
    fn from(raw: RawVulnerability) -> Self {
        Finding {
            id: raw.vulnerability_id.unwrap_or_default(),
            package: raw.pkg_name.unwrap_or_default(),
            severity: Severity::parse(&raw.severity.unwrap_or_default()),
            title: raw.title.unwrap_or_default(),
        }
    }
}

/// Parse a scan report file into the flat finding list, preserving input
/// order. A missing `Results` key or empty result set yields an empty vec;
/// an unreadable file or invalid JSON yields a [`ReportError`].
pub fn parse_report(path: &Path) -> Result<Vec<Finding>, ReportError> {
    let raw = std::fs::read_to_string(path)?;
    let report: ScanReport = serde_json::from_str(&raw)?;
    Ok(report
        .results
        .into_iter()
        .flat_map(|result| result.vulnerabilities.unwrap_or_default())
        .map(Finding::from)
        .collect())
}
