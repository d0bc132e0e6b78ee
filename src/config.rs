use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Configuration for essencebot loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// NapCat forward WebSocket endpoint.
    pub ws_url: String,
    /// Optional NapCat access token, sent as a query parameter.
    pub access_token: Option<String>,
    /// SQLite database holding essence backups.
    pub essence_db_path: PathBuf,
    /// How long to wait for one NapCat API call before giving up.
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_inner(true)
    }

    #[cfg(test)]
    pub fn from_env_no_dotenv() -> Result<Self> {
        Self::from_env_inner(false)
    }

    fn from_env_inner(load_dotenv: bool) -> Result<Self> {
        if load_dotenv {
            dotenvy::dotenv().ok();
        }

        let ws_url =
            std::env::var("NAPCAT_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:3000".to_string());
        if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
            return Err(anyhow!("NAPCAT_WS_URL must start with ws:// or wss://"));
        }

        let access_token = std::env::var("NAPCAT_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let essence_db_path = PathBuf::from(
            std::env::var("ESSENCE_DB_PATH").unwrap_or_else(|_| "./data/essence.db".to_string()),
        );

        let request_timeout = Duration::from_millis(
            std::env::var("NAPCAT_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse::<u64>()
                .map_err(|_| anyhow!("NAPCAT_REQUEST_TIMEOUT_MS must be a valid integer"))?,
        );

        debug!(
            ws_url = %ws_url,
            has_access_token = access_token.is_some(),
            essence_db = %essence_db_path.display(),
            request_timeout_ms = request_timeout.as_millis() as u64,
            "Config resolved from environment"
        );

        Ok(Config {
            ws_url,
            access_token,
            essence_db_path,
            request_timeout,
        })
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Config {{\n  ws_url: {},\n  access_token: {},\n  essence_db_path: {:?},\n  request_timeout: {:?},\n}}",
            self.ws_url,
            if self.access_token.is_some() { "***MASKED***" } else { "None" },
            self.essence_db_path,
            self.request_timeout,
        )
    }
}
