//! Error types for Vault secret retrieval

use thiserror::Error;

use crate::client::ApiError;

/// Result type alias for Vault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned while retrieving a secret
#[derive(Debug, Error)]
pub enum Error {
    /// Connection parameters could not be resolved from Kubernetes
    #[error(transparent)]
    Config(#[from] pdo_common::Error),

    /// Vault could not be reached or rejected the request
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The secret at `path` does not have a usable KV-v2 payload
    #[error("malformed secret payload at {path}: {reason}")]
    MalformedSecretPayload {
        /// Full Vault path that was read
        path: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// The requested property is not part of the secret
    #[error("{property} not set in vault at {path}")]
    PropertyNotFound {
        /// Property that was requested
        property: String,
        /// Full Vault path that was read
        path: String,
    },

    /// The requested property exists but is empty
    #[error("{property} is empty in vault at {path}")]
    EmptyProperty {
        /// Property that was requested
        property: String,
        /// Full Vault path that was read
        path: String,
    },
}

impl Error {
    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSecretPayload {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
