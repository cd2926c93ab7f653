mod config;
mod research;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Iterative web research: search, evaluate, repeat, then write a Markdown report.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Topic to research
    #[arg(short, long)]
    query: String,

    /// Maximum number of search rounds
    #[arg(short, long, default_value_t = 3)]
    iterations: usize,

    /// Fetch the top result pages and feed their text to the report
    #[arg(long, conflicts_with = "no_scrape")]
    scrape: bool,

    /// Use search snippets only
    #[arg(long)]
    no_scrape: bool,

    /// Write every model exchange to this Markdown file
    #[arg(long)]
    transcript: Option<PathBuf>,
}

async fn run(args: Args) -> Result<String> {
    let mut config = config::Config::from_env().context("invalid configuration")?;
    config.research.max_iterations = args.iterations;
    if args.scrape {
        config.research.scrape_pages = true;
    } else if args.no_scrape {
        config.research.scrape_pages = false;
    }

    let orchestrator =
        research::Orchestrator::new(config, args.query, args.transcript.as_deref())?;
    let report = orchestrator.run().await?;

    Ok(report.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("research_agent=info,deep_research=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tokio::select! {
        result = run(args) => match result {
            Ok(report) => {
                print!("{}", report);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            eprintln!("Research interrupted.");
            ExitCode::SUCCESS
        }
    }
}
