//! Configuration management
//!
//! This module handles loading and parsing configuration for LearnHub.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the storefront front end)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/learnhub.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl() -> u64 {
    600
}

fn default_max_entries() -> u64 {
    10_000
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a login session in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Signing secret of the auth provider's webhooks (`whsec_...`)
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Accepted clock skew for webhook timestamps, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            webhook_secret: None,
            webhook_tolerance_seconds: default_webhook_tolerance(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

fn default_webhook_tolerance() -> i64 {
    300
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - LEARNHUB_SERVER_HOST
    /// - LEARNHUB_SERVER_PORT
    /// - LEARNHUB_SERVER_CORS_ORIGIN
    /// - LEARNHUB_DATABASE_DRIVER
    /// - LEARNHUB_DATABASE_URL
    /// - LEARNHUB_CACHE_TTL_SECONDS
    /// - LEARNHUB_AUTH_SESSION_DAYS
    /// - LEARNHUB_AUTH_WEBHOOK_SECRET
    /// - LEARNHUB_AUTH_WEBHOOK_TOLERANCE_SECONDS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LEARNHUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LEARNHUB_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("LEARNHUB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("LEARNHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("LEARNHUB_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("LEARNHUB_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(days) = std::env::var("LEARNHUB_AUTH_SESSION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if days > 0 {
                    self.auth.session_days = days;
                }
            }
        }
        if let Ok(secret) = std::env::var("LEARNHUB_AUTH_WEBHOOK_SECRET") {
            if !secret.trim().is_empty() {
                self.auth.webhook_secret = Some(secret);
            }
        }
        if let Ok(tolerance) = std::env::var("LEARNHUB_AUTH_WEBHOOK_TOLERANCE_SECONDS") {
            if let Ok(tolerance) = tolerance.parse::<i64>() {
                self.auth.webhook_tolerance_seconds = tolerance;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches LEARNHUB_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "LEARNHUB_SERVER_HOST",
    "LEARNHUB_SERVER_PORT",
    "LEARNHUB_SERVER_CORS_ORIGIN",
    "LEARNHUB_DATABASE_DRIVER",
    "LEARNHUB_DATABASE_URL",
    "LEARNHUB_CACHE_TTL_SECONDS",
    "LEARNHUB_AUTH_SESSION_DAYS",
    "LEARNHUB_AUTH_WEBHOOK_SECRET",
    "LEARNHUB_AUTH_WEBHOOK_TOLERANCE_SECONDS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            "[a-z][a-z0-9]{0,10}",
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            "[a-z][a-z0-9_/]{0,20}\\.db",
            1u64..=86400,
            1i64..=365,
            proptest::option::of("whsec_[A-Za-z0-9]{8,32}"),
        )
            .prop_map(|(host, port, driver, url, ttl, days, secret)| Config {
                server: ServerConfig {
                    host,
                    port,
                    cors_origin: default_cors_origin(),
                },
                database: DatabaseConfig { driver, url },
                cache: CacheConfig {
                    ttl_seconds: ttl,
                    max_entries: default_max_entries(),
                },
                auth: AuthConfig {
                    session_days: days,
                    webhook_secret: secret,
                    webhook_tolerance_seconds: default_webhook_tolerance(),
                },
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config to YAML and loading it back yields the same values.
        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.database.url, parsed.database.url);
            prop_assert_eq!(config.cache.ttl_seconds, parsed.cache.ttl_seconds);
            prop_assert_eq!(config.auth.session_days, parsed.auth.session_days);
            prop_assert_eq!(config.auth.webhook_secret, parsed.auth.webhook_secret);
        }

        /// A valid port in the environment always wins over the file.
        #[test]
        fn env_port_takes_precedence(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = lock_env();
            clear_env();

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "server:\n  port: {}\n", file_port).expect("Failed to write config");
            std::env::set_var("LEARNHUB_SERVER_PORT", env_port.to_string());

            let config = Config::load_with_env(file.path()).expect("Failed to load config");
            clear_env();

            prop_assert_eq!(config.server.port, env_port);
        }
    }
}
