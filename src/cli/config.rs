//! Configuration file structure
//!
//! A single JSON file. Everything except the token secrets has a default.
//!
//! `storage.endpoint`, `storage.secure`, and `storage.admin_password` describe
//! a networked S3-compatible backend. `serve` runs the in-memory backend and
//! credential store, so those fields are validated and reported but nothing
//! connects to them, and accounts do not survive a restart.

use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::{CliError, CliResult};
use crate::auth::TokenConfig;
use crate::file_storage::DEFAULT_MAX_UPLOAD_BYTES;
use crate::http_server::HttpServerConfig;
use crate::observability::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpServerConfig,

    pub tokens: TokenSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    /// Minimum severity written to the log (default: "INFO")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    pub access_secret: String,

    pub refresh_secret: String,

    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: i64,

    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Reserved for a networked backend
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Reserved for a networked backend
    #[serde(default)]
    pub secure: bool,

    /// Identity that owns every bucket the service creates
    #[serde(default = "default_admin_user")]
    pub admin_user: String,

    /// Reserved for a networked backend
    #[serde(default)]
    pub admin_password: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_access_ttl_secs() -> i64 {
    900
}

fn default_refresh_ttl_secs() -> i64 {
    604_800
}

fn default_endpoint() -> String {
    "localhost:9000".to_string()
}

fn default_admin_user() -> String {
    "minioadmin".to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            secure: false,
            admin_user: default_admin_user(),
            admin_password: String::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn ttl(field: &str, secs: i64) -> CliResult<Duration> {
    Duration::try_seconds(secs)
        .ok_or_else(|| CliError::config_error(format!("{} is out of range", field)))
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        self.token_config()?
            .validate()
            .map_err(|e| CliError::config_error(e.to_string()))?;

        self.severity()?;

        if self.storage.endpoint.is_empty() {
            return Err(CliError::config_error("storage.endpoint must not be empty"));
        }
        if self.storage.admin_user.is_empty() {
            return Err(CliError::config_error("storage.admin_user must not be empty"));
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(CliError::config_error("storage.max_upload_bytes must be > 0"));
        }

        if let Some(bad) = self
            .http
            .cors_origins
            .iter()
            .find(|o| o.parse::<axum::http::HeaderValue>().is_err())
        {
            return Err(CliError::config_error(format!(
                "Invalid CORS origin: '{}'",
                bad
            )));
        }

        Ok(())
    }

    pub fn token_config(&self) -> CliResult<TokenConfig> {
        Ok(TokenConfig {
            access_secret: self.tokens.access_secret.clone(),
            refresh_secret: self.tokens.refresh_secret.clone(),
            access_ttl: ttl("tokens.access_ttl_secs", self.tokens.access_ttl_secs)?,
            refresh_ttl: ttl("tokens.refresh_ttl_secs", self.tokens.refresh_ttl_secs)?,
        })
    }

    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(|e: String| CliError::config_error(format!("Invalid log_level: {}", e)))
    }

    /// Effective configuration with every secret left out
    pub fn redacted(&self) -> Value {
        json!({
            "http": self.http,
            "tokens": {
                "access_ttl_secs": self.tokens.access_ttl_secs,
                "refresh_ttl_secs": self.tokens.refresh_ttl_secs,
            },
            "storage": {
                "endpoint": self.storage.endpoint,
                "secure": self.storage.secure,
                "admin_user": self.storage.admin_user,
                "max_upload_bytes": self.storage.max_upload_bytes,
            },
            "log_level": self.log_level,
        })
    }
}
