mod config;
mod routes;

use anyhow::Result;
use tracing::{error, info};

use parley_gateway::Hub;
use parley_store::{HistoryBackend, HistoryStore, JsonFileBackend, MemoryBackend, SqliteBackend};

use crate::config::{HistoryBackendKind, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_server=debug,parley_gateway=debug,parley_store=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Load persisted history
    let backend: Box<dyn HistoryBackend> = match config.history_backend {
        HistoryBackendKind::Json => Box::new(JsonFileBackend::new(&config.history_path)),
        HistoryBackendKind::Sqlite => Box::new(SqliteBackend::open(&config.history_path)?),
        HistoryBackendKind::Memory => Box::new(MemoryBackend),
    };
    let history = HistoryStore::open(backend)?;

    let hub = Hub::new(history);
    let app = routes::build(hub.clone(), config.static_dir.clone());

    info!("Parley server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Final flush so nothing held only in memory is lost
    if let Err(e) = hub.flush().await {
        error!("Failed to flush history on shutdown: {:#}", e);
    }
    info!("Parley server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
