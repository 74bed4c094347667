//! User-management CLI client
//!
//! Presents a numbered menu on stdin/stdout and issues each selected
//! operation against the server.

use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usermgr_client::{App, ClientConfig, UsersClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ClientConfig::load()?;

    // Logs go to stderr so they do not interleave with the menu
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("usermgr_client={}", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server_url = %config.server_url,
        timeout_ms = config.timeout_ms,
        "Starting user-management client"
    );

    let client = UsersClient::new(&config.server_url, config.timeout());
    App::new(client, BufReader::new(tokio::io::stdin()), std::io::stdout())
        .run()
        .await?;

    Ok(())
}
