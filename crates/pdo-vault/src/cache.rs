//! Read-through file cache for Vault secrets
//!
//! Each (mount, property) pair is cached as a plain-text file holding only the
//! secret value. Freshness comes from the file's modification time: a file
//! older than the staleness window is refetched and overwritten. Failing to
//! write the cache never fails a lookup; failing to read it triggers one
//! direct fetch from Vault.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use pdo_common::{ConfigSource, KeyedLocks};
use serde_json::Value;
use tracing::{debug, error, info, info_span, instrument, warn, Span};

use crate::client::{SecretResponse, VaultApi, VaultClient};
use crate::{Error, Result, VaultAccess};

/// How long a cached secret is served before Vault is asked again
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

/// Vault secret lookups backed by a local file cache
pub struct SecretCache {
    vault: Arc<dyn VaultApi>,
    dir: PathBuf,
    max_age: Duration,
    locks: KeyedLocks,
    span: Span,
}

impl SecretCache {
    /// Create a cache in the system temp directory
    pub fn new(vault: Arc<dyn VaultApi>) -> Self {
        Self {
            vault,
            dir: std::env::temp_dir(),
            max_age: DEFAULT_MAX_AGE,
            locks: KeyedLocks::new(),
            span: info_span!("pagerduty_vault"),
        }
    }

    /// Create a cache talking to Vault over HTTP
    pub fn with_default_client() -> Result<Self> {
        Ok(Self::new(Arc::new(VaultClient::new()?)))
    }

    /// Store cache files in `dir` instead of the temp directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Override the staleness window
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Emit all events of this cache inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Cache file used for `access`
    pub fn cache_path(&self, access: &VaultAccess) -> PathBuf {
        let name = format!("{}-{}", access.mount, access.property).replace(['/', '\\'], "_");
        self.dir.join(name)
    }

    /// Return the secret value, from cache when fresh and from Vault otherwise
    #[instrument(parent = &self.span, skip_all, fields(mount = %access.mount, property = %access.property))]
    pub async fn get(&self, access: &VaultAccess) -> Result<String> {
        let path = self.cache_path(access);
        let _guard = self.locks.lock(&path.to_string_lossy()).await;

        if !self.is_fresh(&path).await {
            let secret = self.query_vault(access).await?;
            if let Err(e) = save_secret(&path, &secret).await {
                error!(path = %path.display(), error = %e, "Failed to save secret");
                return Ok(secret);
            }
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(secret) => Ok(secret),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read cached secret - removing");
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %e, "Failed to remove cached secret");
                }
                self.query_vault(access).await
            }
        }
    }

    /// Whether the cache file exists and is younger than the staleness window
    async fn is_fresh(&self, path: &Path) -> bool {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to stat cached secret");
                }
                return false;
            }
        };

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "No modification time for cached secret");
                return false;
            }
        };

        match SystemTime::now().checked_sub(self.max_age) {
            Some(cutoff) => modified >= cutoff,
            None => true,
        }
    }

    async fn query_vault(&self, access: &VaultAccess) -> Result<String> {
        let full_path = access.full_path();
        debug!(path = %full_path, "Reading secret from vault");

        let response = self
            .vault
            .read(&access.url, &access.token, &full_path)
            .await?;
        extract_property(&response, &full_path, &access.property)
    }
}

/// Pull `property` out of a KV-v2 read response
fn extract_property(response: &SecretResponse, path: &str, property: &str) -> Result<String> {
    let secret = response
        .data
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::malformed(path, "data is not a mapping"))?;

    for warning in response.warnings.iter().rev() {
        info!(path = %path, warning = %warning, "Vault warning");
    }

    if secret.is_empty() {
        return Err(Error::malformed(path, "secret data is empty"));
    }

    let value = secret
        .iter()
        .find(|(name, _)| name.as_str() == property)
        .map(|(_, value)| stringify(value))
        .ok_or_else(|| Error::PropertyNotFound {
            property: property.to_string(),
            path: path.to_string(),
        })?;

    if value.is_empty() {
        return Err(Error::EmptyProperty {
            property: property.to_string(),
            path: path.to_string(),
        });
    }
    Ok(value)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Overwrite the cache file with `value`
///
/// A partially written file is removed so it is never served later.
async fn save_secret(path: &Path, value: &str) -> std::io::Result<()> {
    if let Err(e) = tokio::fs::write(path, value).await {
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }
    Ok(())
}

/// Resolve Vault parameters from `namespace/secret_name` and fetch the secret
pub async fn get_vault_secret(
    source: &dyn ConfigSource,
    cache: &SecretCache,
    namespace: &str,
    secret_name: &str,
) -> Result<String> {
    let access = VaultAccess::resolve(source, namespace, secret_name).await?;
    cache.get(&access).await
}
