//! Configuration management for the Parley client.
//!
//! The client reads a single configuration file at `~/.parley/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (PARLEY_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Backend
//! - `PARLEY_BACKEND_URL` → backend.base_url
//! - `PARLEY_MODEL` → backend.model
//! - `PARLEY_TIMEOUT_SECS` → backend.timeout_secs
//!
//! ## Auth
//! - `PARLEY_AUTH_PROVIDER` → auth.provider (`static` or `secure_token`)
//! - `PARLEY_TOKEN` → auth.token
//! - `PARLEY_API_KEY` → auth.api_key
//! - `PARLEY_EMAIL` → auth.email
//!
//! ## Observability
//! - `PARLEY_LOG_LEVEL` → observability.log_level
//! - `PARLEY_LOG_FORMAT` → observability.log_format
//!
//! `PARLEY_CONFIG` points at an alternative config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".parley"),
        |dirs| dirs.home_dir().join(".parley"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Backend Configuration
// ============================================================================

/// Chat backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the chat backend, e.g. `http://localhost:8000`
    #[serde(default = "default_base_url", alias = "url")]
    pub base_url: String,

    /// Model name forwarded with every chat request
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}

fn default_model() -> String {
    "gpt-4".into()
}

fn default_backend_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Auth Configuration
// ============================================================================

/// Which identity provider backs the auth session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProviderKind {
    /// A fixed bearer token for a fixed identity (development, tests)
    #[default]
    Static,
    /// Email/password sign-in against the identity platform's secure token API
    SecureToken,
}

impl std::str::FromStr for AuthProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "static" => Ok(Self::Static),
            "secure_token" | "securetoken" => Ok(Self::SecureToken),
            other => Err(format!("unknown auth provider: {other}")),
        }
    }
}

/// Identity and token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Provider kind
    #[serde(default)]
    pub provider: AuthProviderKind,

    /// Bearer token for the static provider
    #[serde(default)]
    pub token: Option<String>,

    /// User id reported by the static provider
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Email used for password sign-in (secure token provider)
    #[serde(default)]
    pub email: Option<String>,

    /// Web API key of the identity platform project
    #[serde(default, alias = "apiKey")]
    pub api_key: Option<String>,

    /// Identity toolkit endpoint (password sign-in)
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,

    /// Secure token endpoint (refresh-token exchange)
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Refresh a token this many seconds before it expires
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,

    /// Upper bound on a single token request, in seconds
    #[serde(default = "default_auth_timeout_secs")]
    pub timeout_secs: u64,

    /// Lifetime handed out by the static provider, in seconds
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: AuthProviderKind::default(),
            token: None,
            user_id: default_user_id(),
            email: None,
            api_key: None,
            identity_endpoint: default_identity_endpoint(),
            token_endpoint: default_token_endpoint(),
            refresh_skew_secs: default_refresh_skew_secs(),
            timeout_secs: default_auth_timeout_secs(),
            token_lifetime_secs: default_token_lifetime_secs(),
        }
    }
}

impl AuthConfig {
    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.refresh_skew_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }
}

fn default_user_id() -> String {
    "local-user".into()
}

fn default_identity_endpoint() -> String {
    "https://identitytoolkit.googleapis.com".into()
}

fn default_token_endpoint() -> String {
    "https://securetoken.googleapis.com".into()
}

fn default_refresh_skew_secs() -> u64 {
    60
}

fn default_auth_timeout_secs() -> u64 {
    10
}

fn default_token_lifetime_secs() -> u64 {
    3600
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets held at `warn`.
    ///
    /// The built-in noisy modules (hyper, reqwest, h2, rustls) are always
    /// filtered; this list adds to them.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the Parley client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chat backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Identity provider settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration (honouring `PARLEY_CONFIG`) with environment overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = match std::env::var("PARLEY_CONFIG") {
            Ok(path) => Self::load_from(Path::new(&path))?,
            Err(_) => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Unparseable numeric or enum values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PARLEY_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(model) = lookup("PARLEY_MODEL") {
            self.backend.model = model;
        }
        if let Some(timeout) = lookup("PARLEY_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => self.backend.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid PARLEY_TIMEOUT_SECS"),
            }
        }

        if let Some(provider) = lookup("PARLEY_AUTH_PROVIDER") {
            match provider.parse() {
                Ok(kind) => self.auth.provider = kind,
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid PARLEY_AUTH_PROVIDER"),
            }
        }
        if let Some(token) = lookup("PARLEY_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Some(key) = lookup("PARLEY_API_KEY") {
            self.auth.api_key = Some(key);
        }
        if let Some(email) = lookup("PARLEY_EMAIL") {
            self.auth.email = Some(email);
        }

        if let Some(level) = lookup("PARLEY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("PARLEY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}
