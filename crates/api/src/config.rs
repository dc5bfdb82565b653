//! Application configuration

use std::env;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
///
/// Stripe settings are read separately by `specwright_billing::StripeConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_allowed_origins: Vec<String>,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication (Supabase)
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub auth_timeout: Duration,

    // Feature flags
    pub enable_billing: bool,

    // Logging
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
            auth_timeout: Duration::from_millis(
                env::var("AUTH_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
            ),

            // Feature flags
            enable_billing: env::var("ENABLE_BILLING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),

            // Logging
            log_format: match env::var("LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
                "" | "pretty" | "text" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => return Err(ConfigError::Invalid("LOG_FORMAT must be 'pretty' or 'json'")),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "BIND_ADDRESS",
        "CORS_ALLOWED_ORIGINS",
        "SUPABASE_URL",
        "ENABLE_BILLING",
        "LOG_FORMAT",
    ];

    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_database_url_required() {
        cleanup_config();

        match Config::from_env() {
            Err(ConfigError::Missing("DATABASE_URL")) => {}
            other => panic!("Expected Missing error for DATABASE_URL, got: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");

        let config = Config::from_env().unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert!(config.cors_allowed_origins.is_empty());
        assert!(config.enable_billing);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.auth_timeout, Duration::from_secs(5));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("CORS_ALLOWED_ORIGINS", "https://app.specwright.dev, http://localhost:5173,");
        env::set_var("SUPABASE_URL", "https://abc.supabase.co/");
        env::set_var("ENABLE_BILLING", "false");
        env::set_var("LOG_FORMAT", "JSON");

        let config = Config::from_env().unwrap();

        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://app.specwright.dev", "http://localhost:5173"]
        );
        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert!(!config.enable_billing);
        assert_eq!(config.log_format, LogFormat::Json);

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_unknown_log_format_rejected() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("LOG_FORMAT", "xml");

        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        cleanup_config();
    }
}
