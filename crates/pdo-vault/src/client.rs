//! Vault HTTP API capability
//!
//! Only authenticated logical reads are needed. The token and address travel
//! with each call because every secret lookup carries its own credentials.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

#[cfg(test)]
use mockall::automock;

/// Header carrying the Vault token
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Errors returned by the Vault API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Nothing is stored at the path
    #[error("no secret found at {path}")]
    NotFound {
        /// Path that was read
        path: String,
    },

    /// Any other non-success response
    #[error("vault returned {status} for {path}: {}", .errors.join("; "))]
    Http {
        /// Path that was read
        path: String,
        /// HTTP status code
        status: u16,
        /// Error strings from the response body
        errors: Vec<String>,
    },

    /// The request never produced a response
    #[error("vault request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not valid JSON
    #[error("failed to decode vault response: {0}")]
    Decode(String),
}

/// A logical read response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SecretResponse {
    /// Response payload; for KV-v2 the secret itself is nested under `data`
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    /// Warnings attached by Vault, oldest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Operations needed from Vault
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Read the logical path `path` from the Vault at `address`
    async fn read(&self, address: &str, token: &str, path: &str)
        -> Result<SecretResponse, ApiError>;
}

/// Vault client over reqwest
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
}

impl VaultClient {
    /// Create a client with default transport settings
    pub fn new() -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl VaultApi for VaultClient {
    async fn read(
        &self,
        address: &str,
        token: &str,
        path: &str,
    ) -> Result<SecretResponse, ApiError> {
        let url = format!(
            "{}/v1/{}",
            address.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, token)
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        trace!(path = %path, status = %status, "Vault response");

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            let errors = serde_json::from_slice::<ErrorBody>(&body)
                .map(|b| b.errors)
                .unwrap_or_else(|_| vec![String::from_utf8_lossy(&body).into_owned()]);
            return Err(ApiError::Http {
                path: path.to_string(),
                status: status.as_u16(),
                errors,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
