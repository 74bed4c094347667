//! Client configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Deadline for each call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            timeout_ms: default_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional config file and the environment
    pub fn load() -> Result<Self, ConfigError> {
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
        if let Some(url) = lookup("USERMGR_SERVER_URL") {
            self.server_url = url;
        }

        if let Some(val) = lookup("USERMGR_TIMEOUT_MS") {
            self.timeout_ms = val.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "timeout_ms",
                value: val.clone(),
            })?;
        }

        if let Some(level) = lookup("USERMGR_LOG_LEVEL") {
            self.log_level = level;
        }

        Ok(())
    }

    fn find_config_file() -> Option<PathBuf> {
        let mut locations = vec![PathBuf::from("usermgr-client.toml")];
        if let Some(dir) = dirs::config_dir() {
            locations.push(dir.join("usermgr").join("client.toml"));
        }

        locations.into_iter().find(|p| p.exists())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.server_url).map_err(|_| ConfigError::InvalidValue {
            key: "server_url",
            value: self.server_url.clone(),
        })?;

        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_ms",
                value: "0".to_string(),
            });
        }

        Ok(())
    }

    /// Per-call deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        config
            .apply_env(|key| match key {
                "USERMGR_SERVER_URL" => Some("http://10.0.0.2:9000".to_string()),
                "USERMGR_TIMEOUT_MS" => Some("250".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.server_url, "http://10.0.0.2:9000");
        assert_eq!(config.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env(|key| (key == "USERMGR_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "timeout_ms", .. }));

        let config = ClientConfig {
            server_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
