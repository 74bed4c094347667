//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// SQLite database file
    Sqlite,
    /// PostgreSQL server
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mock" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "psql" => Ok(Self::Postgres),
            _ => Err(ConfigError::InvalidValue {
                key: "storage",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Which storage backend to use
    #[serde(default)]
    pub storage: StorageBackend,

    /// Database URL (required for the sqlite and postgres backends)
    #[serde(default)]
    pub database_url: Option<String>,

    /// Table holding the user records
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Maximum pooled database connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in milliseconds
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Per-request deadline for storage calls, in milliseconds (0 disables)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Use the in-memory store when the database cannot be reached
    #[serde(default)]
    pub fallback_to_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_table_name() -> String {
    user_store::DEFAULT_TABLE_NAME.to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            storage: StorageBackend::default(),
            database_url: None,
            table_name: default_table_name(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            fallback_to_memory: false,
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional config file and the environment
    ///
    /// Precedence: environment, then config file, then defaults.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut config = match Self::find_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Override fields from `USERMGR_*` variables resolved through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("USERMGR_BIND_ADDRESS") {
            self.bind_address = addr;
        }

        if let Some(backend) = lookup("USERMGR_STORAGE") {
            self.storage = backend.parse()?;
        }

        if let Some(url) = lookup("USERMGR_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database_url = Some(url);
        }

        if let Some(table) = lookup("USERMGR_TABLE_NAME") {
            self.table_name = table;
        }

        if let Some(val) = lookup("USERMGR_MAX_CONNECTIONS") {
            self.max_connections = parse_value("max_connections", &val)?;
        }

        if let Some(val) = lookup("USERMGR_ACQUIRE_TIMEOUT_MS") {
            self.acquire_timeout_ms = parse_value("acquire_timeout_ms", &val)?;
        }

        if let Some(val) = lookup("USERMGR_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_value("request_timeout_ms", &val)?;
        }

        if let Some(val) = lookup("USERMGR_FALLBACK_TO_MEMORY") {
            self.fallback_to_memory = parse_value("fallback_to_memory", &val)?;
        }

        if let Some(level) = lookup("USERMGR_LOG_LEVEL") {
            self.log_level = level;
        }

        Ok(())
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut locations = vec![
            PathBuf::from("usermgr-server.toml"),
            PathBuf::from("/etc/usermgr/server.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            locations.push(dir.join("usermgr").join("server.toml"));
        }

        locations.into_iter().find(|p| p.exists())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "bind_address",
                value: self.bind_address.clone(),
            })?;

        // With fallback enabled a missing URL degrades to the memory store at startup
        if self.storage != StorageBackend::Memory
            && self.database_url.is_none()
            && !self.fallback_to_memory
        {
            return Err(ConfigError::MissingDatabaseUrl(self.storage));
        }

        user_store::validate_table_name(&self.table_name).map_err(|_| {
            ConfigError::InvalidValue {
                key: "table_name",
                value: self.table_name.clone(),
            }
        })?;

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_connections",
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Time to wait for a pooled database connection
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Per-request storage deadline, if enabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Database URL is required for the {0} backend")]
    MissingDatabaseUrl(StorageBackend),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
