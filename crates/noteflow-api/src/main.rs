//! noteflow-api - HTTP API server for the noteflow enrichment service.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noteflow_api::{build_router, AppState};
use noteflow_core::{defaults, PipelineConfig};
use noteflow_inference::OpenAiModelClient;
use noteflow_pipeline::{MemoryContentStore, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noteflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PipelineConfig::from_env();
    let models = Arc::new(OpenAiModelClient::from_env()?);
    // The persistence service is an external collaborator; the in-memory
    // store stands in until one is wired up.
    let store = Arc::new(MemoryContentStore::new());

    let orchestrator = Arc::new(Orchestrator::new(models, store, config));
    orchestrator.start_sweeper();

    let state = AppState {
        orchestrator: orchestrator.clone(),
    };
    let app = build_router(state);

    let port = std::env::var("NOTEFLOW_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "noteflow API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
