//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for the signed speech-synthesis backend. Only assembled when
/// all three variables are present.
#[derive(Clone, Debug)]
pub struct VolcCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub app_id: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub data_dir: PathBuf,
    pub allowed_origin: String,
    pub chat_api_url: String,
    pub chat_api_key: Option<String>,
    pub chat_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub volc: Option<VolcCredentials>,
    pub tts_timeout: Duration,
    pub mock_chunk_delay: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let allowed_origin =
            std::env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Generation endpoint ---
        let chat_api_url = std::env::var("CHAT_API_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com/chat/completions".to_string());
        let chat_api_key = std::env::var("DEEPSEEK_API_KEY").ok();
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());

        // --- Image divination endpoint ---
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        let gemini_api_url = std::env::var("GEMINI_API_URL").unwrap_or_else(|_| {
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent"
                .to_string()
        });

        // --- Signed TTS backend (optional) ---
        let volc = match (
            std::env::var("VOLC_ACCESS_KEY").ok(),
            std::env::var("VOLC_SECRET_KEY").ok(),
            std::env::var("VOLC_APP_ID").ok(),
        ) {
            (Some(access_key), Some(secret_key), Some(app_id)) => Some(VolcCredentials {
                access_key,
                secret_key,
                app_id,
            }),
            _ => None,
        };

        let tts_timeout_secs = std::env::var("TTS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        if !(30..=60).contains(&tts_timeout_secs) {
            return Err(ConfigError::InvalidValue(
                "TTS_TIMEOUT_SECS".to_string(),
                format!("'{}' is outside the accepted 30-60s range", tts_timeout_secs),
            ));
        }

        let mock_chunk_delay_ms = std::env::var("MOCK_CHUNK_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            bind_address,
            log_level,
            data_dir,
            allowed_origin,
            chat_api_url,
            chat_api_key,
            chat_model,
            gemini_api_key,
            gemini_api_url,
            volc,
            tts_timeout: Duration::from_secs(tts_timeout_secs),
            mock_chunk_delay: Duration::from_millis(mock_chunk_delay_ms),
        })
    }
}
