//! Terminal client configuration
//!
//! Server URL and the cached access token live in `~/.assistgen/config.toml`.
//! The token is a convenience cache; logout just deletes it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Load configuration from file, creating a default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = ClientConfig::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: ClientConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, toml_string).context("Failed to write config file")?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".assistgen").join("config.toml"))
    }

    /// Server base URL, falling back to the local default
    pub fn server_url(&self) -> String {
        self.server
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn set_token(&mut self, token: String) {
        self.server.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.server.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.server.token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_url() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_set_and_clear_token() {
        let mut config = ClientConfig::default();
        config.set_token("abc".to_string());
        assert_eq!(config.token(), Some("abc"));
        config.clear_token();
        assert!(config.token().is_none());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let mut config = ClientConfig::default();
        config.server.url = Some("http://example.com:9000".to_string());
        config.set_token("tok".to_string());

        let toml_string = toml::to_string(&config).unwrap();
        let back: ClientConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(back.server_url(), "http://example.com:9000");
        assert_eq!(back.token(), Some("tok"));
    }
}
