//! Configuration Module
//!
//! Environment-driven configuration for the server, datastore, sessions and
//! the external collaborators. Optional integrations (SMTP, Google OAuth,
//! image CDN) are `None` when their variables are absent, and the service
//! falls back to a local stand-in.

use thiserror::Error;

use crate::database::DatabaseConfig;
use crate::service::jwt::DEFAULT_SESSION_DAYS;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Environment variable helpers
pub mod env {
    use std::env;

    use super::ConfigError;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get environment variable as optional string; empty counts as unset
    pub fn get_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get environment variable as boolean with default
    pub fn get_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u64 with default
    pub fn get_u64(key: &str, default: u64) -> u64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as usize with default
    pub fn get_usize(key: &str, default: usize) -> usize {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as i64 with default
    pub fn get_i64(key: &str, default: i64) -> i64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Check if environment variable is set
    pub fn is_set(key: &str) -> bool {
        env::var(key).is_ok()
    }

    /// Get required environment variable
    pub fn get_required(key: &str) -> Result<String, ConfigError> {
        get_optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }
}

/// Application configuration combining all service configurations
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// SMTP delivery; email is logged instead when absent
    pub email: Option<EmailConfig>,

    /// Google sign-in; the Google routes answer 500 when absent
    pub google_oauth: Option<GoogleOAuthConfig>,

    /// Avatar CDN; uploads fail when absent
    pub cdn: Option<CdnConfig>,

    pub book_catalog: BookCatalogConfig,

    /// Public base URL of the web client, used to build email links
    pub app_base_url: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub max_request_size: usize,
}

/// Session token configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub session_days: i64,
}

/// Email service configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub from_name: String,
    pub from_email: String,
}

/// Google OAuth specific configuration
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub state_expires_minutes: i64,
}

/// Cloudinary credentials
#[derive(Debug, Clone)]
pub struct CdnConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base_url: String,
}

/// Google Books API settings
#[derive(Debug, Clone)]
pub struct BookCatalogConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::get_string("SERVER_HOST", "0.0.0.0"),
            port: env::get_u16("SERVER_PORT", 3000),
            log_level: env::get_string("LOG_LEVEL", "info"),
            cors_origins: env::get_string("CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            request_timeout_seconds: env::get_u64("REQUEST_TIMEOUT_SECONDS", 30),
            // Room for a 1MB avatar after base64 expansion
            max_request_size: env::get_usize("MAX_REQUEST_SIZE", 2 * 1024 * 1024),
        }
    }
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret: env::get_required("JWT_SECRET")?,
            session_days: env::get_i64("SESSION_EXPIRES_DAYS", DEFAULT_SESSION_DAYS),
        })
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        if !env::is_set("SMTP_HOST") {
            return Ok(None);
        }

        Ok(Some(Self {
            smtp_host: env::get_required("SMTP_HOST")?,
            smtp_port: env::get_u16("SMTP_PORT", 587),
            smtp_username: env::get_required("SMTP_USERNAME")?,
            smtp_password: env::get_required("SMTP_PASSWORD")?,
            smtp_use_tls: env::get_bool("SMTP_USE_TLS", true),
            from_name: env::get_string("SMTP_FROM_NAME", "bookbar"),
            from_email: env::get_required("SMTP_FROM_EMAIL")?,
        }))
    }
}

impl GoogleOAuthConfig {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        if !env::is_set("GOOGLE_CLIENT_ID") {
            return Ok(None);
        }

        Ok(Some(Self {
            client_id: env::get_required("GOOGLE_CLIENT_ID")?,
            client_secret: env::get_required("GOOGLE_CLIENT_SECRET")?,
            redirect_uri: env::get_required("GOOGLE_REDIRECT_URI")?,
            state_expires_minutes: env::get_i64("OAUTH_STATE_EXPIRES_MINUTES", 10),
        }))
    }
}

impl CdnConfig {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        if !env::is_set("CLOUDINARY_CLOUD_NAME") {
            return Ok(None);
        }

        Ok(Some(Self {
            cloud_name: env::get_required("CLOUDINARY_CLOUD_NAME")?,
            api_key: env::get_required("CLOUDINARY_API_KEY")?,
            api_secret: env::get_required("CLOUDINARY_API_SECRET")?,
            api_base_url: env::get_string("CLOUDINARY_API_BASE_URL", "https://api.cloudinary.com"),
        }))
    }
}

impl Default for BookCatalogConfig {
    fn default() -> Self {
        Self {
            api_base_url: env::get_string(
                "GOOGLE_BOOKS_API_BASE_URL",
                "https://www.googleapis.com/books/v1",
            ),
            api_key: env::get_optional("GOOGLE_BOOKS_API_KEY"),
        }
    }
}

impl AppConfig {
    /// Load complete application configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            email: EmailConfig::from_env()?,
            google_oauth: GoogleOAuthConfig::from_env()?,
            cdn: CdnConfig::from_env()?,
            book_catalog: BookCatalogConfig::default(),
            app_base_url: env::get_string("APP_BASE_URL", "http://localhost:3000"),
        })
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::ValidationError(
                "Database min_connections cannot be greater than max_connections".to_string(),
            ));
        }

        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::InvalidValue {
                key: "JWT_SECRET".to_string(),
                reason: "must be at least 32 characters".to_string(),
            });
        }

        if self.jwt.session_days <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_EXPIRES_DAYS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if let Err(e) = url::Url::parse(&self.app_base_url) {
            return Err(ConfigError::InvalidValue {
                key: "APP_BASE_URL".to_string(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }
}
