//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GREENHOUSE_API_URL` - Base URL of the Greenhouse REST backend
//!
//! ## Optional
//! - `GREENHOUSE_SESSION_TOKEN` - Bearer token of the logged-in user (anonymous if unset)
//! - `GREENHOUSE_NOTIFICATION_POLL_SECS` - Unread-count poll interval (default: 30)
//! - `GREENHOUSE_NOTIFICATION_PAGE_SIZE` - Notifications per page (default: 20, max 100)
//! - `GREENHOUSE_SERIALIZE_MUTATIONS` - Allow only one mutation in flight per collection (default: false)
//! - `GREENHOUSE_HTTP_TIMEOUT_SECS` - Per-request timeout (default: none)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_POLL_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Full client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend connection settings
    pub api: ApiConfig,
    /// Cache behaviour
    pub sync: SyncConfig,
}

/// Backend connection settings.
///
/// Implements `Debug` manually to redact the session token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://greenhouse.example.org`
    pub base_url: Url,
    /// Session token sent as `Authorization: Bearer`
    pub session_token: Option<SecretString>,
    /// Per-request timeout; `None` leaves requests unbounded
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Cache behaviour settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Interval between unread-count polls
    pub poll_interval: Duration,
    /// Page size for notification loads
    pub page_size: u32,
    /// Queue mutations so only one is in flight per collection
    pub serialize_mutations: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            serialize_mutations: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: ApiConfig::from_env()?,
            sync: SyncConfig::from_env()?,
        })
    }
}

impl ApiConfig {
    /// Build a config for `base_url` with no token and no timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("GREENHOUSE_API_URL", base_url)?,
            session_token: None,
            timeout: None,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("GREENHOUSE_API_URL")?;
        let timeout = get_optional_env("GREENHOUSE_HTTP_TIMEOUT_SECS")
            .map(|raw| parse_u64("GREENHOUSE_HTTP_TIMEOUT_SECS", &raw, 1))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            base_url: parse_base_url("GREENHOUSE_API_URL", &raw_url)?,
            session_token: get_optional_env("GREENHOUSE_SESSION_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from),
            timeout,
        })
    }
}

impl SyncConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let poll_secs = parse_u64(
            "GREENHOUSE_NOTIFICATION_POLL_SECS",
            &get_env_or_default("GREENHOUSE_NOTIFICATION_POLL_SECS", "30"),
            1,
        )?;

        let page_size = get_env_or_default("GREENHOUSE_NOTIFICATION_PAGE_SIZE", "20")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "GREENHOUSE_NOTIFICATION_PAGE_SIZE".to_string(),
                    e.to_string(),
                )
            })?;
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ConfigError::InvalidEnvVar(
                "GREENHOUSE_NOTIFICATION_PAGE_SIZE".to_string(),
                format!("must be between 1 and {MAX_PAGE_SIZE} (got {page_size})"),
            ));
        }

        let serialize_mutations = parse_bool(
            "GREENHOUSE_SERIALIZE_MUTATIONS",
            &get_env_or_default("GREENHOUSE_SERIALIZE_MUTATIONS", "false"),
        )?;

        Ok(Self {
            poll_interval: Duration::from_secs(poll_secs),
            page_size,
            serialize_mutations,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse the API base URL. Only http(s) is accepted.
fn parse_base_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_u64(var_name: &str, raw: &str, min: u64) -> Result<u64, ConfigError> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if value < min {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("must be at least {min} (got {value})"),
        ));
    }
    Ok(value)
}

fn parse_bool(var_name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("expected a boolean (got '{other}')"),
        )),
    }
}
