// SPDX-License-Identifier: GPL-3.0-only
mod auth;
mod cart;
mod config;
mod connectivity;
mod engine;
mod executor;
mod logging;
mod sync;
mod transport;
mod utils;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use auth::AuthHandle;
use cart::{Credential, DemoSeed};
use config::Config;
use engine::{CartEngine, CartNotice, EngineSettings};
use logging::setup_logging;
use transport::{ReqwestTransport, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_json)?;

    info!("Starting cartsyncd v{}", env!("CARGO_PKG_VERSION"));

    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&config.api_base_url)?);
    info!(api = %config.api_base_url, "Remote cart transport initialized");

    let initial = config
        .api_token
        .as_ref()
        .map(|token| Credential::new(config.api_user.clone(), token.clone()));
    if initial.is_none() {
        info!("No api_token configured, running as guest");
    }
    let auth = AuthHandle::new(initial);

    let engine = CartEngine::start(
        EngineSettings::from_config(&config),
        transport,
        &auth,
        Arc::new(DemoSeed),
    );

    let mut states = engine.subscribe();
    let state_task = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            info!(
                cart_id = ?state.cart_id,
                lines = state.items.len(),
                offline = state.is_offline,
                loading = state.is_loading,
                "Cart state changed"
            );
        }
    });

    let mut notices = engine.notices();
    let notice_task = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(CartNotice::ModeChanged { from, to }) => info!(%from, %to, "Connectivity mode changed"),
                Ok(CartNotice::RemoteRejected { operation, status, message }) => {
                    error!(%operation, status, message = %message, "Cart change rejected by remote")
                }
                Ok(notice) => warn!(?notice, "Cart notice"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped cart notices"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!(mode = %engine.mode(), "All services started. Waiting for shutdown signal...");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    info!("Initiating graceful shutdown...");

    let state = engine.state();
    info!(
        lines = state.items.len(),
        units = engine.item_count(),
        total = engine.total(),
        "Final cart"
    );

    drop(engine);
    state_task.abort();
    notice_task.abort();

    info!("Shutdown complete");
    Ok(())
}
