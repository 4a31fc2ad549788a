use crate::error::{RelayError, Result};
use std::env;

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How long a photo sent without a caption stays usable, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Remote generation calls can take minutes for large edits.
pub const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        TelegramConfig {
            bot_token: bot_token.into(),
            api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| RelayError::ConfigError("TELEGRAM_BOT_TOKEN is required".into()))?;
        let api_base =
            env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| DEFAULT_TELEGRAM_API_BASE.to_string());

        Ok(TelegramConfig {
            bot_token,
            api_base,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_GENERATE_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| RelayError::ConfigError("GEMINI_API_KEY is required".into()))?;
        let api_base = env::var("GEMINI_API_BASE")
            .ok()
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let timeout_secs = env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_GENERATE_TIMEOUT_SECS);

        Ok(GeminiConfig {
            api_key,
            api_base,
            timeout_secs,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub session_ttl_secs: u64,
    pub telegram: TelegramConfig,
    pub gemini: GeminiConfig,
}

impl Config {
    /// Loads the full configuration. Both secrets are required; a missing
    /// one fails startup with an error naming the variable.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(8080);
        let session_ttl_secs = env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        Ok(Config {
            port,
            session_ttl_secs,
            telegram: TelegramConfig::from_env()?,
            gemini: GeminiConfig::from_env()?,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_session_ttl_secs(mut self, session_ttl_secs: u64) -> Self {
        self.session_ttl_secs = session_ttl_secs;
        self
    }
}
