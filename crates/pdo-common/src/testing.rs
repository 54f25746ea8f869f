//! In-memory ConfigSource for unit tests

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::core::ErrorResponse;

use crate::{ConfigSource, Result};

/// ConfigSource serving fixed Secret and ConfigMap payloads
///
/// Objects that were not inserted behave like a 404 from the API server.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigSource {
    secrets: BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>,
    config_maps: BTreeMap<(String, String), BTreeMap<String, String>>,
}

impl InMemoryConfigSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Secret with the given string entries
    pub fn with_secret(mut self, namespace: &str, name: &str, entries: &[(&str, &str)]) -> Self {
        let data = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect();
        self.secrets
            .insert((namespace.to_string(), name.to_string()), data);
        self
    }

    /// Add a ConfigMap with the given entries
    pub fn with_config_map(
        mut self,
        namespace: &str,
        name: &str,
        entries: &[(&str, &str)],
    ) -> Self {
        let data = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.config_maps
            .insert((namespace.to_string(), name.to_string()), data);
        self
    }
}

fn not_found(kind: &str, namespace: &str, name: &str) -> crate::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} \"{}\" not found in {}", kind, name, namespace),
        reason: "NotFound".to_string(),
        code: 404,
    })
    .into()
}

#[async_trait]
impl ConfigSource for InMemoryConfigSource {
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("secrets", namespace, name))
    }

    async fn config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("configmaps", namespace, name))
    }
}
