//! Logging utilities for the Parley client.
//!
//! Structured logging over `tracing`, with trace ids for correlating a
//! store operation with the backend request it issued.
//!
//! # Noise Filtering
//!
//! By default, noisy library modules (hyper, reqwest, h2, rustls) are set to
//! `warn` level so the client's own events stay readable.

use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// Build the filter directive string for the given base level.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }
    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    directives
}

/// Install the global subscriber, writing to stderr.
///
/// `log_level` is the base level, `log_format` is `"json"` or anything else
/// for human-readable lines, and every module in `excluded_targets` is held
/// at `warn` next to [`NOISY_MODULES`]. `RUST_LOG` replaces the computed
/// filter when set. Calling this twice keeps the first subscriber.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let directives = build_directives(log_level, excluded_targets);
    let (filter, filter_source) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, "RUST_LOG"),
        Err(_) => (EnvFilter::new(&directives), "config"),
    };
    let registry = tracing_subscriber::registry().with(filter);

    // Conversation output owns stdout.
    let installed = if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::stderr().is_terminal())
                    .without_time(),
            )
            .try_init()
    };

    if installed.is_err() {
        return;
    }
    tracing::debug!(
        filter_source,
        filter = %directives,
        excluded = ?excluded_targets,
        "Logging initialized"
    );
}

/// Generate a new trace ID for request tracing.
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create a tracing span for backend API calls.
///
/// # Example
///
/// ```ignore
/// let span = api_call_span!(trace_id, method = "POST", path = "/chat");
/// async { /* call API */ }.instrument(span).await;
/// ```
#[macro_export]
macro_rules! api_call_span {
    ($trace_id:expr, $($field:tt)*) => {
        tracing::info_span!("api_call", trace_id = %$trace_id, $($field)*)
    };
}
