//! Vault connection parameters resolved from a Kubernetes Secret

use pdo_common::resolve::{object_ref, required_key};
use pdo_common::ConfigSource;

use crate::Result;

/// Secret key: Vault address
pub const VAULT_URL: &str = "VAULT_URL";
/// Secret key: Vault token
pub const VAULT_TOKEN: &str = "VAULT_TOKEN";
/// Secret key: KV-v2 mount point
pub const VAULT_MOUNT: &str = "VAULT_MOUNT";
/// Secret key: cache key
pub const VAULT_KEY: &str = "VAULT_KEY";
/// Secret key: property within the secret payload
pub const VAULT_PROPERTY: &str = "VAULT_PROPERTY";
/// Secret key: secret path within the mount
pub const VAULT_PATH: &str = "VAULT_PATH";

/// Where a secret lives in Vault and how to authenticate
#[derive(Clone, PartialEq, Eq)]
pub struct VaultAccess {
    /// Namespace of the Secret the parameters were read from
    pub namespace: String,
    /// Name of the Secret the parameters were read from
    pub secret_name: String,
    /// Secret path within the mount
    pub path: String,
    /// Property within the secret payload
    pub property: String,
    /// Vault address
    pub url: String,
    /// Vault token
    pub token: String,
    /// KV-v2 mount point
    pub mount: String,
    /// Cache key
    pub key: String,
}

impl std::fmt::Debug for VaultAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultAccess")
            .field("namespace", &self.namespace)
            .field("secret_name", &self.secret_name)
            .field("path", &self.path)
            .field("property", &self.property)
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("mount", &self.mount)
            .field("key", &self.key)
            .finish()
    }
}

impl VaultAccess {
    /// Read the connection parameters from `namespace/secret_name`
    ///
    /// Every key is required; the first missing or empty one is reported.
    pub async fn resolve(
        source: &dyn ConfigSource,
        namespace: &str,
        secret_name: &str,
    ) -> Result<Self> {
        let data = source.secret_data(namespace, secret_name).await?;
        let object = object_ref(namespace, secret_name);

        let url = required_key(&data, VAULT_URL, &object)?;
        let token = required_key(&data, VAULT_TOKEN, &object)?;
        let mount = required_key(&data, VAULT_MOUNT, &object)?;
        let key = required_key(&data, VAULT_KEY, &object)?;
        let property = required_key(&data, VAULT_PROPERTY, &object)?;
        let path = required_key(&data, VAULT_PATH, &object)?;

        Ok(Self {
            namespace: namespace.to_string(),
            secret_name: secret_name.to_string(),
            path,
            property,
            url,
            token,
            mount,
            key,
        })
    }

    /// Logical path of the secret under the KV-v2 API
    pub fn full_path(&self) -> String {
        format!("{}/data/{}", self.mount, self.path)
    }
}
