//! docpdf
//!
//! Renders a built documentation site to merged, navigable PDFs: one per
//! `toc.json` tree that opts in with `"enablePdf": true`. Pages are
//! printed by a headless Chrome over a local static server, then
//! byte-spliced into a single document per TOC with a unified outline,
//! structure tree and named destinations.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod browser;
mod config;
mod orchestrator;
mod server;

use config::RenderConfig;

#[derive(Parser, Debug)]
#[command(name = "docpdf")]
#[command(about = "Render a documentation site's TOC trees to merged PDFs")]
struct Args {
    /// Directory containing the built site and its toc.json files
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Settings file (defaults to docpdf.json inside the directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of pages rendered in parallel
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    match orchestrator::run(&args.directory, config, args.concurrency).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<RenderConfig> {
    match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                anyhow::anyhow!("Failed to read settings file {}: {e}", path.display())
            })?;
            serde_json::from_str(&content).map_err(|e| {
                anyhow::anyhow!("Failed to parse settings file {}: {e}", path.display())
            })
        }
        None => RenderConfig::load(&args.directory),
    }
}
