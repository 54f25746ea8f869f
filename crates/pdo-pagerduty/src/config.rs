//! PagerDuty configuration resolved from Kubernetes
//!
//! Credentials and service defaults live in the `pagerduty-api-key` Secret in
//! the operator namespace. Per-cluster service and integration IDs live in a
//! `{cluster}-pd-config` ConfigMap next to the cluster.

use pdo_common::resolve::{object_ref, optional_key_or, required_key, required_u32};
use pdo_common::{ConfigSource, OPERATOR_NAMESPACE};
use tracing::debug;

use crate::Result;

/// Name of the Secret holding PagerDuty credentials
pub const API_KEY_SECRET: &str = "pagerduty-api-key";
/// Suffix of the per-cluster ConfigMap name
const CLUSTER_CONFIG_SUFFIX: &str = "-pd-config";
/// Object name reported when an in-memory config fails validation
const TICKETING_CONFIG: &str = "ticketing config";

/// Secret key: PagerDuty REST API token
pub const PAGERDUTY_API_KEY: &str = "PAGERDUTY_API_KEY";
/// Secret key: escalation policy ID
pub const ESCALATION_POLICY_KEY: &str = "ESCALATION_POLICY";
/// Secret key: auto-resolve timeout in seconds
pub const RESOLVE_TIMEOUT_KEY: &str = "RESOLVE_TIMEOUT";
/// Secret key: acknowledgement timeout in seconds
pub const ACKNOWLEDGE_TIMEOUT_KEY: &str = "ACKNOWLEDGE_TIMEOUT";
/// Secret key: optional service name prefix
pub const SERVICE_PREFIX_KEY: &str = "SERVICE_PREFIX";
/// ConfigMap key: provisioned service ID
pub const SERVICE_ID_KEY: &str = "SERVICE_ID";
/// ConfigMap key: provisioned integration ID
pub const INTEGRATION_ID_KEY: &str = "INTEGRATION_ID";

/// Prefix used when the Secret does not set one
pub const DEFAULT_SERVICE_PREFIX: &str = "osd";

/// Everything needed to provision or look up a cluster's PagerDuty service
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TicketingConfig {
    /// Escalation policy assigned to new services
    pub escalation_policy_id: String,
    /// Seconds before incidents auto-resolve
    pub auto_resolve_timeout: u32,
    /// Seconds before acknowledged incidents re-trigger
    pub acknowledge_timeout: u32,
    /// Service name prefix
    pub service_prefix: String,
    /// PagerDuty REST API token
    pub api_key: String,
    /// Cluster identifier
    pub cluster_id: String,
    /// Cluster base DNS domain
    pub base_domain: String,

    /// Service ID, known after provisioning
    pub service_id: String,
    /// Integration ID, known after provisioning
    pub integration_id: String,
}

impl std::fmt::Debug for TicketingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketingConfig")
            .field("escalation_policy_id", &self.escalation_policy_id)
            .field("auto_resolve_timeout", &self.auto_resolve_timeout)
            .field("acknowledge_timeout", &self.acknowledge_timeout)
            .field("service_prefix", &self.service_prefix)
            .field("api_key", &"<redacted>")
            .field("cluster_id", &self.cluster_id)
            .field("base_domain", &self.base_domain)
            .field("service_id", &self.service_id)
            .field("integration_id", &self.integration_id)
            .finish()
    }
}

impl TicketingConfig {
    /// Start a configuration for the given cluster
    pub fn new(cluster_id: impl Into<String>, base_domain: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            base_domain: base_domain.into(),
            service_prefix: DEFAULT_SERVICE_PREFIX.to_string(),
            ..Default::default()
        }
    }

    /// Load credentials and defaults from the PagerDuty Secret
    pub async fn parse_pd_config(&mut self, source: &dyn ConfigSource) -> Result<()> {
        let data = source
            .secret_data(OPERATOR_NAMESPACE, API_KEY_SECRET)
            .await?;
        let object = object_ref(OPERATOR_NAMESPACE, API_KEY_SECRET);

        self.api_key = required_key(&data, PAGERDUTY_API_KEY, &object)?;
        self.escalation_policy_id = required_key(&data, ESCALATION_POLICY_KEY, &object)?;
        self.auto_resolve_timeout = required_u32(&data, RESOLVE_TIMEOUT_KEY, &object)?;
        self.acknowledge_timeout = required_u32(&data, ACKNOWLEDGE_TIMEOUT_KEY, &object)?;
        self.service_prefix =
            optional_key_or(&data, SERVICE_PREFIX_KEY, &object, DEFAULT_SERVICE_PREFIX);

        debug!(
            escalation_policy = %self.escalation_policy_id,
            service_prefix = %self.service_prefix,
            "Parsed PagerDuty config"
        );
        Ok(())
    }

    /// Load the stored service and integration IDs for a cluster
    pub async fn parse_cluster_config(
        &mut self,
        source: &dyn ConfigSource,
        namespace: &str,
        cluster_name: &str,
    ) -> Result<()> {
        let name = cluster_config_map_name(cluster_name);
        let data = source.config_map_data(namespace, &name).await?;
        let object = object_ref(namespace, &name);

        self.service_id = required_key(&data, SERVICE_ID_KEY, &object)?;
        self.integration_id = required_key(&data, INTEGRATION_ID_KEY, &object)?;
        Ok(())
    }

    /// Check that everything provisioning relies on is set
    ///
    /// Service ID, integration ID and prefix may be empty.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("cluster_id", &self.cluster_id),
            ("base_domain", &self.base_domain),
            (PAGERDUTY_API_KEY, &self.api_key),
            (ESCALATION_POLICY_KEY, &self.escalation_policy_id),
        ];
        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((key, _)) => Err(pdo_common::Error::empty_value(*key, TICKETING_CONFIG).into()),
            None => Ok(()),
        }
    }

    /// Deterministic PagerDuty service name for this cluster
    pub fn service_name(&self) -> String {
        format!(
            "{}-{}.{}-hive-cluster",
            self.service_prefix, self.cluster_id, self.base_domain
        )
    }

    /// Description attached to new services
    pub fn service_description(&self) -> String {
        format!("{} - A managed hive created cluster", self.cluster_id)
    }
}

/// Name of the ConfigMap holding a cluster's PagerDuty IDs
pub fn cluster_config_map_name(cluster_name: &str) -> String {
    format!("{}{}", cluster_name, CLUSTER_CONFIG_SUFFIX)
}
