//! Deep Research command-line runner
//!
//! Runs one research pipeline in the terminal, logs each event as it
//! arrives and prints the final report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use research_agent::{GroqClient, ModelConfig, ResearchAgent};
use research_core::ResearchEvent;
use research_services::{save_report, PipelineConfig, ResearchService};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "deep-research")]
#[command(about = "Research a topic with a search-augmented model and write a markdown report")]
#[command(version)]
struct Args {
    /// The research query
    query: String,

    /// Directory to save the markdown report in
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run the extra research-data search before writing the report
    #[arg(long)]
    gather_data: bool,

    /// Do not request or collect images from search results
    #[arg(long)]
    no_images: bool,

    /// Reasoning model override
    #[arg(long, env = "RESEARCH_REASONING_MODEL")]
    reasoning_model: Option<String>,

    /// Search model override
    #[arg(long, env = "RESEARCH_SEARCH_MODEL")]
    search_model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env: {}", e);
        }
    }

    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,deep_research=debug")),
        )
        .init();

    let args = Args::parse();

    let mut model_config = ModelConfig::from_env()?;
    if let Some(model) = &args.reasoning_model {
        model_config.reasoning_model = model.clone();
    }
    if let Some(model) = &args.search_model {
        model_config.search_model = model.clone();
    }

    let client = GroqClient::new(&model_config)?;
    let agent = ResearchAgent::from_config(Arc::new(client), &model_config);

    let mut pipeline_config = PipelineConfig::from_env();
    if args.gather_data {
        pipeline_config.gather_research_data = true;
    }
    if args.no_images {
        pipeline_config.include_images = false;
    }

    let service = ResearchService::new(agent, pipeline_config);
    let mut events = service.start(args.query.clone());

    while let Some(event) = events.recv().await {
        match event {
            ResearchEvent::Progress {
                step,
                message,
                progress,
                ..
            } => match progress {
                Some(fraction) => info!("[{}] {} ({:.0}%)", step, message, fraction * 100.0),
                None => info!("[{}] {}", step, message),
            },
            ResearchEvent::SourcesUpdate { sources, .. } => {
                info!("{} sources collected", sources.len());
            }
            ResearchEvent::Complete {
                report, sources, ..
            } => {
                info!(
                    "Research complete with {} sources",
                    sources.as_ref().map_or(0, Vec::len)
                );
                println!("{}", report);

                if let Some(dir) = &args.output {
                    let path = save_report(dir, &report)?;
                    info!("Report saved to {}", path.display());
                }
                return Ok(());
            }
            ResearchEvent::Error { message } => bail!(message),
        }
    }

    warn!("Research run ended without a final event");
    bail!("research run ended unexpectedly")
}
