//! Configuration module for billing-portal.

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "billing-portal".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig::from_env()?,
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
        })
    }
}

impl DatabaseConfig {
    /// `DATABASE_URL` wins; otherwise the URL is composed from the
    /// `DB_USERNAME` / `DB_PASSWORD` / `DB_ALIAS` triple.
    pub fn from_env() -> Result<Self, AppError> {
        let url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let username = required("DB_USERNAME")?;
                let password = Secret::new(required("DB_PASSWORD")?);
                let alias = required("DB_ALIAS")?;
                compose_database_url(&username, &password, &alias)
            }
        };

        Ok(Self {
            url: Secret::new(url),
            max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: parsed_or("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout_secs: parsed_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30),
        })
    }
}

/// Build a PostgreSQL URL from credentials and a `host[:port]/database`
/// alias. Credentials are percent-encoded.
pub fn compose_database_url(username: &str, password: &Secret<String>, alias: &str) -> String {
    format!(
        "postgres://{}:{}@{}",
        urlencoding::encode(username),
        urlencoding::encode(password.expose_secret()),
        alias.trim_start_matches("postgres://")
    )
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key)
        .map_err(|_| AppError::ConfigError(anyhow::anyhow!("{} is required when DATABASE_URL is unset", key)))
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
