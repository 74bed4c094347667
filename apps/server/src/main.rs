//! User-management server
//!
//! Serves the six user CRUD operations as JSON-RPC over HTTP, backed by the
//! configured storage backend.

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use usermgr_server::{init_tracing, serve, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::load()?;

    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = %config.storage,
        "Starting user-management server"
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await.inspect_err(|e| {
        error!(error = %e, "Failed to initialize application state");
    })?;

    // Bind and serve
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    serve(listener, state, shutdown_signal()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
