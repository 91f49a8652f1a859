//! Environment-driven service configuration
//!
//! All settings come from the process environment (a `.env` file is loaded
//! by the binary before this runs). Provider selection is a pure
//! configuration switch with no fallback logic.

use crate::errors::{AppError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which provider backs an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Deepseek,
    Ollama,
}

impl FromStr for ServiceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEEPSEEK" => Ok(ServiceKind::Deepseek),
            "OLLAMA" => Ok(ServiceKind::Ollama),
            other => Err(AppError::Config(format!(
                "unknown service kind '{other}' (expected DEEPSEEK or OLLAMA)"
            ))),
        }
    }
}

/// DeepSeek API settings (OpenAI-compatible endpoint)
#[derive(Debug, Clone)]
pub struct DeepseekSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Local Ollama server settings
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    pub base_url: String,
    pub chat_model: String,
    pub reason_model: String,
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub chat_service: ServiceKind,
    pub reason_service: ServiceKind,
    pub deepseek: DeepseekSettings,
    pub ollama: OllamaSettings,

    pub serpapi_key: Option<String>,
    pub search_result_count: usize,

    pub database_url: Option<String>,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,

    pub server_host: String,
    pub server_port: u16,
    pub static_dir: Option<PathBuf>,
    pub stream_idle_timeout: Duration,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let chat_service = get_or("CHAT_SERVICE", "DEEPSEEK").parse()?;
        let reason_service = get_or("REASON_SERVICE", "OLLAMA").parse()?;

        let deepseek = DeepseekSettings {
            api_key: get("DEEPSEEK_API_KEY").unwrap_or_default(),
            base_url: get_or("DEEPSEEK_BASE_URL", "https://api.deepseek.com"),
            model: get_or("DEEPSEEK_MODEL", "deepseek-chat"),
        };

        let ollama = OllamaSettings {
            base_url: get_or("OLLAMA_BASE_URL", "http://127.0.0.1:11434"),
            chat_model: get_or("OLLAMA_CHAT_MODEL", "deepseek-r1:32b"),
            reason_model: get_or("OLLAMA_REASON_MODEL", "deepseek-r1:32b"),
        };

        let search_result_count = match get("SEARCH_RESULT_COUNT") {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Config(format!("SEARCH_RESULT_COUNT is not a number: '{raw}'"))
            })?,
            None => 3,
        };

        let access_token_expire_minutes = match get("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Config(format!(
                    "ACCESS_TOKEN_EXPIRE_MINUTES is not a number: '{raw}'"
                ))
            })?,
            None => 30,
        };

        let server_port = match get("SERVER_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("SERVER_PORT is not a port: '{raw}'")))?,
            None => 8000,
        };

        let idle_secs = match get("STREAM_IDLE_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Config(format!("STREAM_IDLE_TIMEOUT_SECS is not a number: '{raw}'"))
            })?,
            None => 90,
        };

        Ok(Settings {
            chat_service,
            reason_service,
            deepseek,
            ollama,
            serpapi_key: get("SERPAPI_KEY"),
            search_result_count,
            database_url: get("DATABASE_URL"),
            secret_key: get_or("SECRET_KEY", "change-me"),
            access_token_expire_minutes,
            server_host: get_or("SERVER_HOST", "0.0.0.0"),
            server_port,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            stream_idle_timeout: Duration::from_secs(idle_secs),
        })
    }

    /// Validate the pieces a running server actually needs
    ///
    /// The DeepSeek key is only required when a DeepSeek-backed endpoint is
    /// configured; Ollama needs nothing beyond a reachable base URL.
    pub fn validate(&self) -> Result<()> {
        let deepseek_selected = self.chat_service == ServiceKind::Deepseek
            || self.reason_service == ServiceKind::Deepseek;
        if deepseek_selected && self.deepseek.api_key.is_empty() {
            return Err(AppError::Config(
                "DEEPSEEK_API_KEY is required when a DeepSeek service is selected".to_string(),
            ));
        }
        Ok(())
    }
}
