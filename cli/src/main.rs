use clap::Parser;
use triage_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    triage_cli::run_main(cli).await
}
