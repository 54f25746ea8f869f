//! PagerDuty REST API v2 capability
//!
//! [`PagerDutyApi`] is the seam the provisioner talks through; the real
//! implementation is a thin reqwest wrapper. Upstream failures are returned as
//! [`ApiError`] and never reinterpreted beyond the duplicate-name signal.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

/// Public PagerDuty REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.pagerduty.com";

/// Media type pinning the REST API version
const ACCEPT_V2: &str = "application/vnd.pagerduty+json;version=2";

/// Page size used when listing services
const LIST_PAGE_LIMIT: usize = 100;

/// Error text PagerDuty returns when a service name is already in use
const DUPLICATE_NAME_MESSAGE: &str = "Name has already been taken";

/// Errors returned by the PagerDuty API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested object does not exist
    #[error("{resource} {id} not found in PagerDuty")]
    NotFound {
        /// Kind of object that was requested
        resource: &'static str,
        /// ID that was requested
        id: String,
    },

    /// Creation was rejected because the name is already in use
    #[error("PagerDuty rejected the request: {message}")]
    DuplicateName {
        /// The upstream error text
        message: String,
    },

    /// Any other non-success response
    #[error("PagerDuty API error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Top-level error message
        message: String,
        /// Detailed error strings
        errors: Vec<String>,
    },

    /// The request never produced a response
    #[error("PagerDuty request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("failed to decode PagerDuty response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether this error is the duplicate-name signal from service creation
    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, ApiError::DuplicateName { .. })
    }

    /// Whether the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// The only place upstream error text is matched against.
fn is_duplicate_name(text: &str) -> bool {
    text.contains(DUPLICATE_NAME_MESSAGE)
}

// =============================================================================
// API objects
// =============================================================================

/// A typed reference to another PagerDuty object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Object ID
    pub id: String,
    /// Reference type (e.g., "escalation_policy_reference")
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// An escalation policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Policy ID
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

impl EscalationPolicy {
    /// Reference to this policy for embedding in a service
    pub fn reference(&self) -> Reference {
        Reference {
            id: self.id.clone(),
            kind: "escalation_policy_reference".to_string(),
        }
    }
}

/// An inbound integration on a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    /// Integration ID, empty until created
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Integration type (e.g., "events_api_v2_inbound_integration")
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Routing key used by alert senders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_key: Option<String>,
}

/// A PagerDuty service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service ID, empty until created
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Unique service name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Escalation policy notified for incidents on this service
    pub escalation_policy: Reference,
    /// Seconds before an incident is automatically resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resolve_timeout: Option<u32>,
    /// Seconds before an acknowledged incident re-triggers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgement_timeout: Option<u32>,
    /// Alert creation mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_creation: Option<String>,
    /// Integrations, populated when the API is asked to include them
    #[serde(default, skip_serializing)]
    pub integrations: Vec<Integration>,
}

#[derive(Serialize, Deserialize)]
struct ServiceEnvelope<T> {
    service: T,
}

#[derive(Serialize, Deserialize)]
struct IntegrationEnvelope<T> {
    integration: T,
}

#[derive(Deserialize)]
struct EscalationPolicyEnvelope {
    escalation_policy: EscalationPolicy,
}

#[derive(Deserialize)]
struct ServiceList {
    #[serde(default)]
    services: Vec<Service>,
    #[serde(default)]
    more: bool,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<String>,
}

// =============================================================================
// Capability trait
// =============================================================================

/// Operations the provisioner needs from PagerDuty
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PagerDutyApi: Send + Sync {
    /// Fetch a service by ID
    async fn get_service(&self, id: &str) -> Result<Service, ApiError>;

    /// Fetch an integration of a service
    async fn get_integration(
        &self,
        service_id: &str,
        integration_id: &str,
    ) -> Result<Integration, ApiError>;

    /// Fetch an escalation policy by ID
    async fn get_escalation_policy(&self, id: &str) -> Result<EscalationPolicy, ApiError>;

    /// Create a service
    async fn create_service(&self, service: &Service) -> Result<Service, ApiError>;

    /// List services whose name matches `query`, with their integrations
    async fn list_services(&self, query: &str) -> Result<Vec<Service>, ApiError>;

    /// Create an integration on a service
    async fn create_integration(
        &self,
        service_id: &str,
        integration: &Integration,
    ) -> Result<Integration, ApiError>;

    /// Delete a service
    async fn delete_service(&self, id: &str) -> Result<(), ApiError>;
}

// =============================================================================
// reqwest implementation
// =============================================================================

/// PagerDuty REST client authenticated with an API token
#[derive(Clone)]
pub struct PagerDutyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for PagerDutyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagerDutyClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PagerDutyClient {
    /// Create a client for the public PagerDuty API
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    /// Create a client for a custom endpoint (proxies, tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, ACCEPT_V2)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token token={}", self.api_key),
            )
    }

    /// Send a request and decode the JSON body of a successful response
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &'static str,
        id: &str,
    ) -> Result<T, ApiError> {
        let body = self.send_raw(request, resource, id).await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_raw(
        &self,
        request: RequestBuilder,
        resource: &'static str,
        id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        trace!(resource, id = %id, status = %status, "PagerDuty response");

        if status.is_success() {
            return Ok(body.to_vec());
        }
        Err(classify(status, &body, resource, id))
    }
}

/// Turn a non-success response into an ApiError
fn classify(status: StatusCode, body: &[u8], resource: &'static str, id: &str) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound {
            resource,
            id: id.to_string(),
        };
    }

    let (message, errors) = match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.errors),
        Err(_) => (String::from_utf8_lossy(body).into_owned(), Vec::new()),
    };

    if let Some(duplicate) = errors.iter().find(|e| is_duplicate_name(e)) {
        return ApiError::DuplicateName {
            message: duplicate.clone(),
        };
    }
    if is_duplicate_name(&message) {
        return ApiError::DuplicateName { message };
    }

    ApiError::Http {
        status: status.as_u16(),
        message,
        errors,
    }
}

#[async_trait]
impl PagerDutyApi for PagerDutyClient {
    async fn get_service(&self, id: &str) -> Result<Service, ApiError> {
        let request = self.request(Method::GET, &format!("/services/{}", id));
        let envelope: ServiceEnvelope<Service> = self.send(request, "service", id).await?;
        Ok(envelope.service)
    }

    async fn get_integration(
        &self,
        service_id: &str,
        integration_id: &str,
    ) -> Result<Integration, ApiError> {
        let request = self.request(
            Method::GET,
            &format!("/services/{}/integrations/{}", service_id, integration_id),
        );
        let envelope: IntegrationEnvelope<Integration> =
            self.send(request, "integration", integration_id).await?;
        Ok(envelope.integration)
    }

    async fn get_escalation_policy(&self, id: &str) -> Result<EscalationPolicy, ApiError> {
        let request = self.request(Method::GET, &format!("/escalation_policies/{}", id));
        let envelope: EscalationPolicyEnvelope =
            self.send(request, "escalation policy", id).await?;
        Ok(envelope.escalation_policy)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, ApiError> {
        let request = self
            .request(Method::POST, "/services")
            .json(&ServiceEnvelope { service });
        let envelope: ServiceEnvelope<Service> =
            self.send(request, "service", &service.name).await?;
        debug!(service_id = %envelope.service.id, name = %envelope.service.name, "Created service");
        Ok(envelope.service)
    }

    async fn list_services(&self, query: &str) -> Result<Vec<Service>, ApiError> {
        let mut services = Vec::new();
        loop {
            let offset = services.len().to_string();
            let limit = LIST_PAGE_LIMIT.to_string();
            let request = self.request(Method::GET, "/services").query(&[
                ("query", query),
                ("include[]", "integrations"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ]);
            let page: ServiceList = self.send(request, "services", query).await?;
            let fetched = page.services.len();
            services.extend(page.services);

            if !page.more || fetched == 0 {
                return Ok(services);
            }
        }
    }

    async fn create_integration(
        &self,
        service_id: &str,
        integration: &Integration,
    ) -> Result<Integration, ApiError> {
        let request = self
            .request(
                Method::POST,
                &format!("/services/{}/integrations", service_id),
            )
            .json(&IntegrationEnvelope { integration });
        let envelope: IntegrationEnvelope<Integration> =
            self.send(request, "service", service_id).await?;
        debug!(service_id = %service_id, integration_id = %envelope.integration.id, "Created integration");
        Ok(envelope.integration)
    }

    async fn delete_service(&self, id: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &format!("/services/{}", id));
        self.send_raw(request, "service", id).await?;
        Ok(())
    }
}
