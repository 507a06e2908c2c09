//! Deep Research API Server
//!
//! Streams multi-stage research runs over server-sent events.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use research_agent::{GroqClient, ModelConfig, ResearchAgent};
use research_api::{build_router, AppState};
use research_services::{PipelineConfig, ResearchService};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local, then .env
    for file in [".env.local", ".env"] {
        if let Err(e) = dotenvy::from_filename(file) {
            // Not an error if the file doesn't exist
            if !matches!(e, dotenvy::Error::Io(_)) {
                eprintln!("Warning: Failed to load {}: {}", file, e);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,research_api=debug")),
        )
        .init();

    info!("Starting Deep Research API");

    // Initialize research service (optional - requires GROQ_API_KEY)
    let research_service = match build_research_service() {
        Ok(service) => {
            info!(
                "Research service initialized (research data: {}, images: {})",
                service.config().gather_research_data,
                service.config().include_images
            );
            Some(service)
        }
        Err(e) => {
            info!(
                "Research service not available: {}. Set GROQ_API_KEY to enable.",
                e
            );
            None
        }
    };

    let app = build_router(AppState::new(research_service));

    // Start server
    let host = std::env::var("SERVER_HOST")
        .ok()
        .and_then(|h| h.parse::<IpAddr>().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let addr = SocketAddr::new(host, port);
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_research_service() -> anyhow::Result<ResearchService> {
    let model_config = ModelConfig::from_env()?;
    let client = GroqClient::new(&model_config)?;
    let agent = ResearchAgent::from_config(Arc::new(client), &model_config);
    Ok(ResearchService::new(agent, PipelineConfig::from_env()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
