//! Application state

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use user_store::{
    CallContext, MemoryUserStore, PostgresUserStore, SqliteUserStore, UserStore, UserStoreError,
};

use crate::{
    config::{ServerConfig, StorageBackend},
    manager::UsersManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Users manager
    pub manager: Arc<UsersManager>,

    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Cancelled on shutdown; every request context is a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state, connecting the configured backend
    pub async fn new(config: ServerConfig) -> Result<Self, StateError> {
        let store: Arc<dyn UserStore> = match connect_store(&config).await {
            Ok(store) => store,
            Err(e) if config.fallback_to_memory && config.storage != StorageBackend::Memory => {
                tracing::warn!(
                    storage = %config.storage,
                    error = %e,
                    "Storage backend unavailable, falling back to in-memory store"
                );
                Arc::new(MemoryUserStore::new())
            }
            Err(e) => return Err(e),
        };

        Ok(Self::with_store(config, store))
    }

    /// Create a state over an already constructed store
    pub fn with_store(config: ServerConfig, store: Arc<dyn UserStore>) -> Self {
        Self {
            manager: Arc::new(UsersManager::new(store)),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Build the deadline and cancellation context for one request
    pub fn call_context(&self) -> CallContext {
        let ctx = CallContext::new().with_token(self.shutdown.child_token());
        match self.config.request_timeout() {
            Some(timeout) => ctx.deadline_at(Instant::now() + timeout),
            None => ctx,
        }
    }
}

async fn connect_store(config: &ServerConfig) -> Result<Arc<dyn UserStore>, StateError> {
    let url = || {
        config
            .database_url
            .as_deref()
            .ok_or(StateError::MissingDatabaseUrl(config.storage))
    };

    match config.storage {
        StorageBackend::Memory => Ok(Arc::new(MemoryUserStore::new())),
        StorageBackend::Sqlite => {
            let store = SqliteUserStore::connect(
                url()?,
                &config.table_name,
                config.max_connections,
                config.acquire_timeout(),
            )
            .await?;
            store.init().await?;
            tracing::info!(table = %config.table_name, "Using SQLite user store");
            Ok(Arc::new(store))
        }
        StorageBackend::Postgres => {
            let store = PostgresUserStore::connect(
                url()?,
                &config.table_name,
                config.max_connections,
                config.acquire_timeout(),
            )
            .await?;
            store.init().await?;
            tracing::info!(table = %config.table_name, "Using PostgreSQL user store");
            Ok(Arc::new(store))
        }
    }
}

/// State initialization errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Database URL is required for the {0} backend")]
    MissingDatabaseUrl(StorageBackend),

    #[error("Failed to initialize storage: {0}")]
    Storage(#[from] UserStoreError),
}
