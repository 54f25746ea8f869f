//! Error types for configuration resolution
//!
//! Resolution errors carry the key that failed and the object it was read
//! from (`namespace/name`) so a misconfigured Secret or ConfigMap can be
//! located without extra logging.

use std::num::ParseIntError;

use thiserror::Error;

/// Errors raised while reading configuration out of Kubernetes objects
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error while fetching the Secret or ConfigMap
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// No usable client configuration (kubeconfig or in-cluster)
    #[error("failed to load kubernetes client config: {message}")]
    ClientConfig {
        /// Description of what failed
        message: String,
    },

    /// A required key is absent from the object
    #[error("{key} does not exist in {object}")]
    MissingKey {
        /// The key that was looked up
        key: String,
        /// The object (`namespace/name`) that was searched
        object: String,
    },

    /// A required key is present but holds an empty value
    #[error("{key} is empty in {object}")]
    EmptyValue {
        /// The key that was looked up
        key: String,
        /// The object (`namespace/name`) that was searched
        object: String,
    },

    /// A numeric key does not hold a non-negative 32-bit integer
    #[error("{key} in {object} is not a valid unsigned integer: {value:?}")]
    InvalidNumber {
        /// The key that was looked up
        key: String,
        /// The object (`namespace/name`) that was searched
        object: String,
        /// The raw value that failed to parse
        value: String,
        /// The parse failure
        #[source]
        source: ParseIntError,
    },
}

impl Error {
    /// Create a missing key error
    pub fn missing_key(key: impl Into<String>, object: impl Into<String>) -> Self {
        Self::MissingKey {
            key: key.into(),
            object: object.into(),
        }
    }

    /// Create an empty value error
    pub fn empty_value(key: impl Into<String>, object: impl Into<String>) -> Self {
        Self::EmptyValue {
            key: key.into(),
            object: object.into(),
        }
    }

    /// Create a client configuration error
    pub fn client_config(message: impl Into<String>) -> Self {
        Self::ClientConfig {
            message: message.into(),
        }
    }

    /// The configuration key this error refers to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::Kube { .. } | Error::ClientConfig { .. } => None,
            Error::MissingKey { key, .. } => Some(key),
            Error::EmptyValue { key, .. } => Some(key),
            Error::InvalidNumber { key, .. } => Some(key),
        }
    }

    /// Check whether the error means the object itself could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Kube {
                source: kube::Error::Api(ae)
            } if ae.code == 404
        )
    }
}
