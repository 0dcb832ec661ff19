use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use site_assessor::{AnalysisMode, AssessorConfig, CancelToken, ExportFormat, SiteAnalyzer, export};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "site-assessor")]
#[command(about = "Assess how hard a website is to scrape and propose content selectors", long_about = None)]
struct Args {
    /// Target URL (scheme optional, https is assumed)
    url: String,

    /// What to analyse
    #[arg(short, long, value_enum, default_value = "both")]
    mode: AnalysisMode,

    /// TOML file overriding weights, thresholds and probe settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Save the report to a file instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    format: ExportFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_level));

    let config = match &args.config {
        Some(path) => AssessorConfig::from_file(path)?,
        None => AssessorConfig::default(),
    };

    let analyzer = SiteAnalyzer::new(config)?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("⏹️  Interrupted, cancelling analysis");
            on_interrupt.cancel();
        }
    });

    let result = analyzer.analyze(&args.url, args.mode, &cancel).await?;
    export::write_report(&result, args.format, args.output.as_deref())?;

    Ok(())
}
