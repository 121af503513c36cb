//! Application Configuration Module
//!
//! Loads settings from the environment (and a `.env` file when present) into a
//! single struct that `main` hands to each part of the service.

use gemini_client::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// Which engine speaks the conversation aloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SpeechBackend {
    /// Drives the `espeak-ng` binary.
    Espeak,
    /// Logs utterances and waits as long as speaking would take.
    Silent,
}

impl FromStr for SpeechBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(Self::Espeak),
            "silent" | "none" => Ok(Self::Silent),
            _ => Err(ConfigError::InvalidSpeechBackend(s.to_string())),
        }
    }
}

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    /// `None` runs the tutor offline with canned responses.
    pub gemini_api_key: Option<SecretString>,
    pub gemini_base_url: String,
    pub chat_model: String,
    pub prompts_dir: Option<PathBuf>,
    pub speech_backend: SpeechBackend,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Unknown SPEECH_BACKEND: {0} (expected espeak or silent)")]
    InvalidSpeechBackend(String),
    #[error("Prompts directory does not exist: {0}")]
    MissingPromptsDir(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY` / `API_KEY`: (Optional) Key for the Gemini API. Offline mode without it.
    // *   `CHAT_MODEL`: (Optional) Model used for every request. Defaults to "gemini-2.5-flash".
    // *   `GEMINI_BASE_URL`: (Optional) API root, handy for pointing at a local stub.
    // *   `PROMPTS_DIR`: (Optional) Directory of prompt overrides.
    // *   `SPEECH_BACKEND`: (Optional) "espeak" (default) or "silent".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .map(SecretString::from);

        let gemini_base_url =
            non_empty("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let chat_model = non_empty("CHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let prompts_dir = non_empty("PROMPTS_DIR").map(PathBuf::from);
        if let Some(dir) = &prompts_dir {
            if !dir.is_dir() {
                return Err(ConfigError::MissingPromptsDir(dir.display().to_string()));
            }
        }

        let speech_backend = match non_empty("SPEECH_BACKEND") {
            Some(value) => value.parse()?,
            None => SpeechBackend::Espeak,
        };

        let log_level_str = non_empty("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key,
            gemini_base_url,
            chat_model,
            prompts_dir,
            speech_backend,
            log_level,
        })
    }

    pub fn is_offline(&self) -> bool {
        self.gemini_api_key.is_none()
    }
}
