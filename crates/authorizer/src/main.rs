//! Authorizer
//!
//! HTTP entry point for the access-control decision engine.

use authorizer::config::Config;
use authorizer::observability::{init_tracing, metrics::init_metrics_recorder};
use authorizer::pipeline::Authorizer;
use authorizer::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting authorizer");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        region = %config.region,
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        audience_check = config.client_id.is_some(),
        jwks_refresh_on_miss = config.jwks_refresh_on_miss,
        "Configuration loaded successfully"
    );

    // Installed before the warm-up so the startup fetch is counted
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let authorizer = Arc::new(Authorizer::from_config(&config));

    // Eager warm-up; on failure the first decision populates the cache
    match authorizer.keys().warm().await {
        Ok(()) => info!("JWKS cache warmed"),
        Err(e) => warn!(error = %e, "JWKS warm-up failed, cache will populate lazily"),
    }

    let state = Arc::new(AppState { authorizer });
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Authorizer listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Authorizer shutdown complete");

    Ok(())
}

/// Returns when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
