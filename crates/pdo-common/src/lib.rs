//! Common types for the PagerDuty operator helpers: errors, configuration
//! resolution from Kubernetes objects, and small shared utilities.

#![deny(missing_docs)]

pub mod error;
pub mod locks;
pub mod resolve;
pub mod source;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::Error;
pub use locks::{KeyedLockGuard, KeyedLocks};
pub use source::{ConfigSource, KubeConfigSource};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the operator and its PagerDuty credentials live in
pub const OPERATOR_NAMESPACE: &str = "pagerduty-operator";
