//! Error types for PagerDuty provisioning

use thiserror::Error;

use crate::client::ApiError;

/// Result type alias for PagerDuty operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by PagerDuty provisioning
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be resolved from Kubernetes
    #[error(transparent)]
    Config(#[from] pdo_common::Error),

    /// The PagerDuty API rejected or failed a request
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The configured escalation policy could not be fetched
    #[error("escalation policy {policy_id} not found in PagerDuty: {source}")]
    PolicyNotFound {
        /// The configured escalation policy ID
        policy_id: String,
        /// The lookup failure
        #[source]
        source: ApiError,
    },
}

impl Error {
    /// The upstream API error, if this error came from PagerDuty
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            Error::PolicyNotFound { source, .. } => Some(source),
            Error::Config(_) => None,
        }
    }
}
