use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use triage_core::AnalyzerConfig;
use triage_core::SummaryKind;
use triage_core::model_report;
use triage_core::stream_model_report;
use triage_core::summarize_report;

/// Summarize a container image scan report and ask a language model for a
/// prioritized remediation plan.
#[derive(Debug, Parser)]
#[command(name = "trivy-triage", version)]
pub struct Cli {
    /// Path to the scanner's JSON report (an object with a `Results` array).
    pub report: PathBuf,

    /// Model identifier to query. Defaults to $OPENAI_MODEL.
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum findings rendered into the prompt. Defaults to
    /// $TRIVY_MAX_ITEMS or 50.
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Print the model's answer incrementally as it arrives.
    #[arg(long)]
    pub stream: bool,

    /// Per network call timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Cap on generated tokens. Defaults to $LLM_MAX_TOKENS or uncapped.
    #[arg(long)]
    pub max_output_tokens: Option<u64>,
}

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    init_tracing();

    let mut config = AnalyzerConfig::from_env();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(max_items) = cli.max_items {
        config.max_items = max_items;
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(cap) = cli.max_output_tokens.filter(|cap| *cap > 0) {
        config.max_output_tokens = Some(cap);
    }

    // The bounded summary is available before the model answers.
    let summary = summarize_report(&cli.report, config.max_items);
    println!("## Vulnerability summary (top {} by severity)", config.max_items);
    println!("{}", summary.text);
    println!();
    println!("Metrics: {}", summary.metrics.to_json());
    println!();

    if summary.kind == SummaryKind::ReadError {
        // Handled outcome, uniform text contract: still exit 0.
        return Ok(());
    }

    println!("## Model report");
    if cli.stream {
        let mut stdout = std::io::stdout();
        let mut sink = move |delta: &str| {
            let _ = write!(stdout, "{delta}");
            let _ = stdout.flush();
        };
        if let Err(err) = stream_model_report(&config, &summary, &mut sink).await {
            println!("{}", err.diagnostic());
            return Ok(());
        }
        println!();
    } else {
        let text = model_report(&config, &summary).await;
        println!("{text}");
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
