//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use textbook_core::ingest::{DEFAULT_MAX_FILE_BYTES, DEFAULT_PREVIEW_CHARS};
use textbook_core::persistence::DEFAULT_STORAGE_KEY;
use textbook_core::UploadLimits;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the project collection is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    File { path: PathBuf },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: StorageBackend,
    pub storage_key: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub outline_model: String,
    pub max_upload_bytes: u64,
    pub export_delay: Duration,
    pub cors_origin: String,
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
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and storage ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let storage = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(database_url) => StorageBackend::Postgres { database_url },
            None => StorageBackend::File {
                path: lookup("STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data")),
            },
        };
        let storage_key = lookup("STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- API keys (as optional) ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let outline_model = lookup("OUTLINE_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        // --- Upload and export behaviour ---
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", &lookup, DEFAULT_MAX_FILE_BYTES)?;
        let export_delay = Duration::from_millis(parse_or("EXPORT_DELAY_MS", &lookup, 1500u64)?);
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            storage,
            storage_key,
            log_level,
            openai_api_key,
            outline_model,
            max_upload_bytes,
            export_delay,
            cors_origin,
        })
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_bytes: self.max_upload_bytes,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

fn parse_or<F>(name: &str, lookup: &F, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_use_the_file_store() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.storage, StorageBackend::File { path: PathBuf::from("./data") });
        assert_eq!(config.storage_key, "textbookProjects");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.outline_model, "gpt-4o-mini");
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.export_delay, Duration::from_millis(1500));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn database_url_selects_postgres() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/textbooks")]).unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Postgres { database_url: "postgres://localhost/textbooks".to_string() }
        );
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        let err = config_from(&[("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "BIND_ADDRESS"));

        let err = config_from(&[("EXPORT_DELAY_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "EXPORT_DELAY_MS"));

        let err = config_from(&[("RUST_LOG", "loud")]).unwrap_err();
        assert!(err.to_string().contains("not a valid log level"));
    }
}
