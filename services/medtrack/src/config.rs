//! services/medtrack/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which text generation backend to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeneratorMode {
    Mock,
    Live,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub generator_mode: GeneratorMode,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
    pub mock_delay: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Storage and Logging ---
        let data_dir = lookup("MEDTRACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generator Selection ---
        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());
        let use_mock = match lookup("MEDTRACK_USE_MOCK") {
            Some(value) => parse_bool("MEDTRACK_USE_MOCK", &value)?,
            None => gemini_api_key.is_none(),
        };
        let generator_mode = if use_mock {
            GeneratorMode::Mock
        } else {
            if gemini_api_key.is_none() {
                return Err(ConfigError::MissingVar("GEMINI_API_KEY".to_string()));
            }
            GeneratorMode::Live
        };

        let gemini_model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let gemini_endpoint = lookup("GEMINI_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        // --- Generation Parameters ---
        let temperature = parse_or("AI_TEMPERATURE", lookup("AI_TEMPERATURE"), 0.7_f32)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "AI_TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", temperature),
            ));
        }
        let max_output_tokens =
            parse_or("AI_MAX_OUTPUT_TOKENS", lookup("AI_MAX_OUTPUT_TOKENS"), 1024_u32)?;
        let timeout_secs = parse_or("AI_TIMEOUT_SECS", lookup("AI_TIMEOUT_SECS"), 30_u64)?;
        let mock_delay_ms = parse_or("MOCK_DELAY_MS", lookup("MOCK_DELAY_MS"), 1000_u64)?;

        Ok(Self {
            data_dir,
            log_level,
            generator_mode,
            gemini_api_key,
            gemini_model,
            gemini_endpoint,
            temperature,
            max_output_tokens,
            request_timeout: Duration::from_secs(timeout_secs),
            mock_delay: Duration::from_millis(mock_delay_ms),
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("medtrack"))
        .unwrap_or_else(|| PathBuf::from("./medtrack-data"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_to_mock_without_a_key() {
        let config = load(&[]).unwrap();
        assert_eq!(config.generator_mode, GeneratorMode::Mock);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.max_output_tokens, 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn key_switches_to_live_mode() {
        let config = load(&[("GEMINI_API_KEY", "abc"), ("GEMINI_ENDPOINT", "http://x/models/")]).unwrap();
        assert_eq!(config.generator_mode, GeneratorMode::Live);
        assert_eq!(config.gemini_endpoint, "http://x/models");
    }

    #[test]
    fn live_mode_requires_a_key() {
        let err = load(&[("MEDTRACK_USE_MOCK", "false")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "GEMINI_API_KEY"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            load(&[("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("AI_TEMPERATURE", "5")]),
            Err(ConfigError::InvalidValue(..))
        ));
        assert!(matches!(
            load(&[("MOCK_DELAY_MS", "soon")]),
            Err(ConfigError::InvalidValue(..))
        ));
    }
}
