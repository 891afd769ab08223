//! Parley Common - Shared configuration, validation, and logging for the Parley chat client.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment overrides)
//! - Configuration validation
//! - Logging setup and request trace ids
//! - Small string helpers used by the terminal front end

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{AuthConfig, AuthProviderKind, BackendConfig, Config, ObservabilityConfig};
pub use validation::{Validate, ValidationError, ValidationResult};

