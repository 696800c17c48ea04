//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Deployment environment. Controls log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEnv {
    /// JSON log lines for log aggregation
    Production,
    /// Human-readable log lines
    Development,
}

impl AppEnv {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("development") {
            Self::Development
        } else {
            Self::Production
        }
    }
}

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("memory") {
            Self::Memory
        } else {
            Self::Sqlite
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8080)
    pub port: u16,
    /// Deployment environment
    pub app_env: AppEnv,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    pub db_path: PathBuf,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first, if present.
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        // Port
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        // Environment
        let app_env = AppEnv::from_str(&env::var("APP_ENV").unwrap_or_else(|_| "production".into()));

        // Storage provider
        let storage_provider = StorageProvider::from_str(
            &env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "sqlite".into()),
        );

        // DB path (for sqlite)
        let db_path = env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/app.db"));

        // CORS allow origin
        let cors_origin_str = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        Ok(Self {
            port,
            app_env,
            storage_provider,
            db_path,
            cors_allow_origin,
        })
    }
}
