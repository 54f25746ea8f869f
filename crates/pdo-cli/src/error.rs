//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] pdo_common::Error),

    #[error(transparent)]
    PagerDuty(#[from] pdo_pagerduty::Error),

    #[error(transparent)]
    Vault(#[from] pdo_vault::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Telemetry(#[from] pdo_common::telemetry::TelemetryError),
}
