use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod app;
mod auth;
mod config;
mod db;
mod error;
mod inference;
mod iot;
mod model;
mod prompts;

use app::{build_router, AppState};
use config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is fine, the process env still applies
    let _ = dotenvy::dotenv();

    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // -----------------------------
    // Config
    // -----------------------------
    let config = GatewayConfig::from_env()?;

    // -----------------------------
    // Shared state / Dependencies
    // -----------------------------
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    info!(
        addr = %config.bind_addr,
        model = %config.generation.model,
        tuya = %config.tuya.endpoint,
        "starting jarvis gateway"
    );

    let listener = TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
