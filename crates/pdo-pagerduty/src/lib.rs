//! PagerDuty provisioning for managed clusters
//!
//! Resolves PagerDuty credentials from Kubernetes, then creates (or adopts) a
//! per-cluster PagerDuty service with a single Events API v2 integration.

#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod provisioner;

pub use client::{
    ApiError, EscalationPolicy, Integration, PagerDutyApi, PagerDutyClient, Reference, Service,
    DEFAULT_API_URL,
};
pub use config::{
    cluster_config_map_name, TicketingConfig, ACKNOWLEDGE_TIMEOUT_KEY, API_KEY_SECRET,
    DEFAULT_SERVICE_PREFIX, ESCALATION_POLICY_KEY, INTEGRATION_ID_KEY, PAGERDUTY_API_KEY,
    RESOLVE_TIMEOUT_KEY, SERVICE_ID_KEY, SERVICE_PREFIX_KEY,
};
pub use error::{Error, Result};
pub use provisioner::{ServiceProvisioner, INTEGRATION_NAME, INTEGRATION_TYPE};
