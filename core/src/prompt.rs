use triage_api_client::Prompt;

use crate::summary::Summary;

/// Template revision. Any change to the instruction text below is a behavior
/// change and must bump this constant.
pub const PROMPT_VERSION: &str = "1";

const SYSTEM_INSTRUCTION: &str = "You are a senior container and supply-chain security analyst. \
You answer in ENGLISH, clearly and actionably, without hallucinating. \
Do not invent CVEs, versions, or fix versions. If a piece of data is missing, write 'UNKNOWN'. \
Keep your reasoning internal; return ONLY the requested final report.";

/// Render the summarization output into the fixed system/user instruction
/// pair. Pure function of its input; performs no I/O and cannot fail.
pub fn build_prompt(summary: &Summary) -> Prompt {
    let metrics_json = summary.metrics.to_json();
    let user = format!(
        r#"Analyze the following container image and its summarized vulnerabilities. Produce a short, prioritized, actionable report.

## Input data
- Aggregated metrics: {metrics_json}
- CVEs (deduplicated):
{finding_lines}

## Output instructions (strict format)
Deliver one section: a Markdown report with the action plan.

### 1) Report
1. **Executive summary.** How exposed the image is and why.
2. **Top findings (table)** with these EXACT columns:
CVE | Package | Severity | Installed version | Fixed version | Exploitability (low/medium/high) | Container impact (build/runtime) | Suggested action
- If there is no fixed version, write 'NO-FIX' and suggest a mitigation.
3. **Prioritized mitigation plan** (P0/P1/P2/P3) with horizons: P0=48h, P1=7d, P2=30d, P3=backlog.
- Prioritize by: severity, exploitability, exposure (runtime vs build), fix availability, and ease of changing the base image.
4. **Hardening**: least privilege, non-root user, read-only fs, dropped capabilities, version pinning, reduced surface (multi-stage builds), scanning in CI.
5. **Residual risks and next steps**: what remains open and how to monitor it.

**Extra rules:**
- If several CVEs affect the same package, group the recommendation (avoid repeating identical actions).
- If most findings come from the base system, suggest moving to an equivalent '-slim' or distroless base.
- If there is not enough data, say so explicitly (do not invent).

Return it as the LAST output, with no text after it. Do not include comments or multiple documents."#,
        finding_lines = summary.text,
    );

    Prompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
    }
}
