use std::net::SocketAddr;

use anyhow::Context;
use schoolops_api::config::{self, StoreBackend};
use schoolops_api::database::DatabaseManager;
use schoolops_api::state::AppState;
use schoolops_api::is_production;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")))
        .init();

    let config = config::config().clone();
    config.validate().map_err(|msg| anyhow::anyhow!("invalid configuration: {msg}"))?;
    tracing::info!("Starting SchoolOps API in {:?} mode", config.environment);

    if config.database.backend == StoreBackend::Memory && is_production!() {
        anyhow::bail!("the in-memory store cannot be used in production");
    }

    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open the datastore")?;

    let port = config.api.port;
    let state = AppState::from_config(config, store).context("invalid access gate configuration")?;
    let app = schoolops_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("SchoolOps API listening on http://{}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
