//! K2 Gateway - headless daemon.
//!
//! An OpenAI-compatible HTTP gateway in front of the K2-Think API:
//! - Chat completions with token rotation and failover on /v1/*
//! - Token pool administration on /admin/tokens/*
//! - Automatic credential refresh in the background

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use k2gate_core::refresh::RefreshReason;
use k2gate_core::GatewayConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod state;

use cli::Cli;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = GatewayConfig::from_env();
    config.host = args.host;
    config.port = args.port;
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    info!("🚀 K2 Gateway starting...");

    let state = AppState::build(config.clone()).map_err(|e| anyhow::anyhow!("{e}"))?;

    // A crash mid-swap can leave a tmp file behind.
    state.updater.cleanup_stale_tmp().await;

    // Seed the pool from the active token file, falling back to a
    // startup refresh when it is missing or empty.
    match state.pool.load_from_file(&config.token_file) {
        Ok(count) => info!("📊 Loaded {count} tokens from {}", config.token_file.display()),
        Err(e) => {
            warn!("⚠️ Could not load token file ({e}), requesting startup refresh");
            state.scheduler.request(RefreshReason::StartupEmpty);
        }
    }

    let app = api::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🌐 Gateway listening on http://{addr}");
    info!("🔀 OpenAI endpoints at http://{addr}/v1/");
    info!("🔧 Admin endpoints at http://{addr}/admin/tokens/");

    axum::serve(listener, app).await?;

    Ok(())
}
