use std::path::PathBuf;
use std::sync::Arc;

use latency_probe_common::config::Config;
use latency_probe_endpoint::{serve, AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let state = Arc::new(AppState::with_system_clock(config.endpoint.processing_delay()));

    let addr = config.endpoint.addr();
    info!(
        addr,
        processing_delay_ms = config.endpoint.processing_delay_ms,
        "latency-probe endpoint starting"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    if let Err(e) = serve(listener, state, shutdown_signal()).await {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
    info!("latency-probe endpoint stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
