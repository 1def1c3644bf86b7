//! Mock services binary.
//!
//! Serves the in-memory registry and gateway on one port so the squid
//! client can be pointed at them with `SQUID_AQUARIUS_URI` and
//! `SQUID_BRIZO_URI`.

use std::sync::Arc;

use tokio::signal;

use mock_services::app;
use mock_services::config::ServerConfig;
use mock_services::state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "mock_services=info,squid=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = ServerConfig::from_env()?;
    let state: SharedState = Arc::new(AppState::new(cfg.public_url.clone()));

    tracing::info!("mock services listening on http://{}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.listen_addr))?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("mock services error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
