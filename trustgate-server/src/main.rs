//! Trustgate Server - REST API for trusted-device management and adaptive MFA
//!
//! Exposes the device registry and risk evaluator via HTTP endpoints:
//! - POST /api/v1/devices        - register a trusted device
//! - POST /api/v1/trust/check    - check whether a device is trusted
//! - POST /api/v1/trust/evaluate - full MFA decision with reason trail

use tracing_subscriber::EnvFilter;

use trustgate_server::{create_router, AppState, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let state = match AppState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    };

    let app = create_router(state, &config);
    let addr = config.socket_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "trustgate-server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
