//! Configuration validation for the Parley client.
//!
//! Checks that required values are present and within valid ranges
//! before any network component is constructed.

use thiserror::Error;

use crate::config::{AuthConfig, AuthProviderKind, BackendConfig, Config, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.backend.validate() {
            errors.push(e);
        }
        if let Err(e) = self.auth.validate() {
            errors.push(e);
        }
        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Config {
    /// Load, apply environment overrides, and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

fn validate_http_url(field: &str, value: &str) -> ValidationResult<()> {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: e.to_string(),
        }),
    }
}

impl Validate for BackendConfig {
    fn validate(&self) -> ValidationResult<()> {
        validate_http_url("backend.base_url", &self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "backend.model".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "backend.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for AuthConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "auth.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        match self.provider {
            AuthProviderKind::Static => {
                if self.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
                    return Err(ValidationError::MissingField {
                        field: "auth.token".into(),
                    });
                }
                if self.token_lifetime_secs <= self.refresh_skew_secs {
                    return Err(ValidationError::InvalidValue {
                        field: "auth.token_lifetime_secs".into(),
                        reason: "must exceed auth.refresh_skew_secs".into(),
                    });
                }
            }
            AuthProviderKind::SecureToken => {
                if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                    return Err(ValidationError::MissingField {
                        field: "auth.api_key".into(),
                    });
                }
                validate_http_url("auth.identity_endpoint", &self.identity_endpoint)?;
                validate_http_url("auth.token_endpoint", &self.token_endpoint)?;
            }
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
