//! User-management server library
//!
//! This module exposes the server components so the binary, the client's
//! integration tests, and embedding callers share one router.

pub mod config;
pub mod manager;
pub mod rpc;
pub mod state;

use std::future::Future;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::{ConfigError, ServerConfig, StorageBackend};
pub use manager::{ErrorKind, ManagerError, UsersManager};
pub use rpc::dispatch_method;
pub use state::{AppState, StateError};

/// Build the HTTP router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc::handle_rpc))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `listener` until `signal` resolves
///
/// Resolving the signal cancels the state's shutdown token, so storage calls
/// still in flight return a cancellation error instead of holding up exit.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = state.shutdown.clone();
    let app = create_app(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            shutdown.cancel();
        })
        .await
}

/// Initialize tracing; `RUST_LOG` takes precedence over `log_level`
pub fn init_tracing(log_level: &str) {
    let level = match log_level {
        "trace" | "debug" | "info" | "warn" | "error" => log_level,
        _ => "info",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "usermgr_server={level},user_store={level},tower_http=debug"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
