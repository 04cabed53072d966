//! Application entrypoint and state wiring.

mod config;
mod error;
mod ledger;
mod logging;
mod model;
mod routes;
mod validation;

use anyhow::Context;
use config::Config;
use ledger::Ledger;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    logging::init_logging(&config.log_level, config.log_format);

    // 1) ledger
    info!("creating genesis block");
    let ledger = Ledger::new(config.ledger_config());
    let genesis = ledger.tail();
    info!(hash = %genesis.hash, config = ?ledger.config(), "blockchain ready");

    // 2) shared state + router
    let state = AppState {
        ledger: Arc::new(ledger),
    };
    let app = routes::router(state);

    // 3) serve
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
