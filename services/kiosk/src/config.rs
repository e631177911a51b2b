//! services/kiosk/src/config.rs
//!
//! Defines the kiosk's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the worker passport is kept on this device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialBackend {
    /// Ordinary persistent key/value storage (SQLite).
    Standard { database_url: String },
    /// AES-256-GCM sealed file, for devices with a provisioned key.
    Secure { path: PathBuf, key: [u8; 32] },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub log_level: Level,
    pub credential_backend: CredentialBackend,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Local surface ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:4000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        // --- Backend ---
        let api_base_url = var("API_BASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("API_BASE_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let timeout_str = var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "15".to_string());
        let request_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ))
            }
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Credential storage ---
        let backend_str = var("CREDENTIAL_BACKEND").unwrap_or_else(|| "standard".to_string());
        let credential_backend = match backend_str.to_lowercase().as_str() {
            "standard" => CredentialBackend::Standard {
                database_url: var("CREDENTIAL_DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://sitepass.db?mode=rwc".to_string()),
            },
            "secure" => {
                let path = var("CREDENTIAL_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./worker_passport.enc"));
                let encoded = var("CREDENTIAL_KEY")
                    .ok_or_else(|| ConfigError::MissingVar("CREDENTIAL_KEY".to_string()))?;
                CredentialBackend::Secure {
                    path,
                    key: decode_key(&encoded)?,
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(
                    "CREDENTIAL_BACKEND".to_string(),
                    format!("'{}' is neither 'standard' nor 'secure'", other),
                ))
            }
        };

        Ok(Self {
            bind_address,
            api_base_url,
            request_timeout,
            log_level,
            credential_backend,
        })
    }
}

fn decode_key(encoded: &str) -> Result<[u8; 32], ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("CREDENTIAL_KEY".to_string(), reason);
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(format!("expected 32 bytes, got {}", b.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_standard_storage_and_fifteen_second_timeout() {
        let config = load(&[("API_BASE_URL", "https://field.example.com/")]).unwrap();

        assert_eq!(config.api_base_url, "https://field.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:4000");
        assert!(matches!(config.credential_backend, CredentialBackend::Standard { .. }));
    }

    #[test]
    fn backend_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "API_BASE_URL"));
    }

    #[test]
    fn secure_storage_needs_a_32_byte_key() {
        let base = ("API_BASE_URL", "http://localhost:8001");
        let missing = load(&[base, ("CREDENTIAL_BACKEND", "secure")]);
        assert!(matches!(missing, Err(ConfigError::MissingVar(_))));

        let short = load(&[base, ("CREDENTIAL_BACKEND", "secure"), ("CREDENTIAL_KEY", "c2hvcnQ=")]);
        assert!(matches!(short, Err(ConfigError::InvalidValue(..))));

        let key = STANDARD.encode([7u8; 32]);
        let config = load(&[base, ("CREDENTIAL_BACKEND", "secure"), ("CREDENTIAL_KEY", key.as_str())]).unwrap();
        assert!(matches!(config.credential_backend, CredentialBackend::Secure { key, .. } if key == [7u8; 32]));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = load(&[("API_BASE_URL", "http://localhost"), ("REQUEST_TIMEOUT_SECS", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(var, _)) if var == "REQUEST_TIMEOUT_SECS"));
    }
}
