//! Docket API server
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... docket-server --port 8000 --data-dir ./data
//! ```

use clap::Parser;
use docket_api::{create_router, AppState, LogFormat, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::debug!(config = ?config, "Loaded configuration");

    let state = AppState::from_config(&config)?;
    let backend = state.storage_backend;
    let model = state.completion_model.clone();
    let audit = state.audit.clone();
    let router = create_router(state);

    let addr = config.bind_addr();
    tracing::info!(
        addr = %addr,
        storage = backend.as_str(),
        model = %model,
        "Starting Docket API server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    audit.flush().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
