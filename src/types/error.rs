use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Command context is not initialized")]
    ContextNotInitialized,

    #[error("Command catalog is not initialized")]
    CatalogNotInitialized,

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("NapCat API call '{action}' failed with retcode {retcode}: {message}")]
    Api {
        action: String,
        retcode: i64,
        message: String,
    },

    #[error("NapCat API call '{action}' timed out")]
    Timeout { action: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Unsupported event kind for command dispatch")]
    UnsupportedEvent,
}

impl BotError {
    /// Returns true if this error comes from startup configuration rather
    /// than runtime I/O. Such errors are not recoverable by retrying the
    /// event; the startup order has to be fixed.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ContextNotInitialized | Self::CatalogNotInitialized | Self::Config { .. }
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn api(action: impl Into<String>, retcode: i64, message: impl Into<String>) -> Self {
        Self::Api {
            action: action.into(),
            retcode,
            message: message.into(),
        }
    }

    pub fn timeout(action: impl Into<String>) -> Self {
        Self::Timeout {
            action: action.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
