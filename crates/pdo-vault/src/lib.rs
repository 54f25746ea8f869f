//! Vault secret retrieval for the PagerDuty operator
//!
//! Vault connection parameters are read from a Kubernetes Secret. Secret
//! values are fetched from a KV-v2 mount and cached on local disk for a fixed
//! window so repeated lookups do not hit Vault.

#![deny(missing_docs)]

mod access;
mod cache;
mod client;
mod error;

pub use access::{
    VaultAccess, VAULT_KEY, VAULT_MOUNT, VAULT_PATH, VAULT_PROPERTY, VAULT_TOKEN, VAULT_URL,
};
pub use cache::{get_vault_secret, SecretCache, DEFAULT_MAX_AGE};
pub use client::{ApiError, SecretResponse, VaultApi, VaultClient};
pub use error::{Error, Result};
