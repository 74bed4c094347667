//! User-management CLI client library
//!
//! [`UsersClient`] issues the six user operations against the server's
//! JSON-RPC endpoint; [`App`] drives it from a numbered text menu.

pub mod app;
pub mod config;
pub mod server_client;

pub use app::App;
pub use config::{ClientConfig, ConfigError};
pub use server_client::{ClientError, UsersClient};
