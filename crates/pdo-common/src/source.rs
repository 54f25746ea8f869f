//! Kubernetes-backed configuration source
//!
//! Provides trait-based access to Secret and ConfigMap payloads so the
//! resolution logic can be unit tested without a cluster.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::{Error, Result};

/// Read access to the Kubernetes objects holding operator configuration
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the `data` payload of a Secret
    ///
    /// A Secret without data yields an empty map; a missing Secret is an error.
    async fn secret_data(&self, namespace: &str, name: &str)
        -> Result<BTreeMap<String, Vec<u8>>>;

    /// Fetch the `data` payload of a ConfigMap
    async fn config_map_data(&self, namespace: &str, name: &str)
        -> Result<BTreeMap<String, String>>;
}

/// ConfigSource backed by a live Kubernetes API server
#[derive(Clone)]
pub struct KubeConfigSource {
    client: Client,
}

impl KubeConfigSource {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a kubeconfig file, or from the ambient
    /// configuration (in-cluster or `KUBECONFIG`) when no path is given
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::client_config(format!("failed to read {}: {}", path.display(), e))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| Error::client_config(e.to_string()))?
            }
            None => Config::infer()
                .await
                .map_err(|e| Error::client_config(e.to_string()))?,
        };
        let client = Client::try_from(config)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ConfigSource for KubeConfigSource {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets.get(name).await?;
        debug!(namespace = %namespace, secret = %name, "Fetched secret");

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }

    async fn config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = config_maps.get(name).await?;
        debug!(namespace = %namespace, config_map = %name, "Fetched config map");

        Ok(config_map.data.unwrap_or_default())
    }
}
