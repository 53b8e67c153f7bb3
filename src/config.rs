//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default API root of a locally running backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// API root, without a trailing slash (e.g. `http://localhost:8000/api`)
    pub api_base_url: String,
    /// File holding the persisted session (tokens and cached user)
    pub session_file: PathBuf,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Config {
    /// Config for tests only; the session file lives in the temp dir.
    pub fn test_default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_file: env::temp_dir().join("relatorio-test-session.json"),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url = env::var("RELATORIO_API_URL")
            .map(|v| normalize_base_url(&v))
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid("RELATORIO_API_URL", api_base_url));
        }

        let session_file = match env::var("RELATORIO_SESSION_FILE") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_session_file(),
        };

        let request_timeout = match env::var("RELATORIO_TIMEOUT_SECS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid("RELATORIO_TIMEOUT_SECS", v))?,
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            api_base_url,
            session_file,
            request_timeout,
        })
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn default_session_file() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(".config")
            .join("relatorio")
            .join("session.json"),
        None => PathBuf::from(".relatorio-session.json"),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
