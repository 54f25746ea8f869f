//! Tracing subscriber initialization for binaries
//!
//! Library code only emits events through `tracing`; installing a subscriber
//! is left to the binary that embeds it.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,pdo=debug,kube=info,hyper=warn,reqwest=warn";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize tracing subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Plain,
    /// JSON structured output with the current span
    Json,
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Output format
    pub format: LogFormat,
    /// Filter directive overriding `RUST_LOG` and the default
    pub filter: Option<String>,
}

impl TracingConfig {
    fn env_filter(&self) -> EnvFilter {
        match &self.filter {
            Some(directive) => EnvFilter::new(directive),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        }
    }
}

/// Install the global tracing subscriber
///
/// Fails if a subscriber has already been installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter();

    let (plain, json) = match config.format {
        LogFormat::Plain => (
            Some(tracing_subscriber::fmt::layer().with_target(false)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(json)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::SubscriberInit(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_filter_wins() {
        let config = TracingConfig {
            format: LogFormat::Json,
            filter: Some("warn".to_string()),
        };
        assert_eq!(config.env_filter().to_string(), "warn");
    }

    #[test]
    fn test_default_format_is_plain() {
        assert_eq!(TracingConfig::default().format, LogFormat::Plain);
    }
}
