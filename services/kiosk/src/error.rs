//! services/kiosk/src/error.rs
//!
//! Defines the startup error type for the kiosk service. Once the server is
//! running, failures are handled inside the check-in flow and never reach here.

use crate::config::ConfigError;

/// Everything that can stop the `kiosk` binary from coming up.
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The standard credential database could not be opened.
    #[error("Credential database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Credential database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The HTTP client for the backend could not be built (e.g. no TLS roots).
    #[error("Backend client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Binding the local surface, or the server loop itself.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
