//! Per-cluster PagerDuty service provisioning
//!
//! Provisioning is create-or-adopt: a service is created under a name derived
//! from the cluster, and if PagerDuty reports the name as taken the existing
//! service with exactly that name is adopted instead. Each provisioned service
//! ends up with one Events API v2 integration.

use std::sync::Arc;

use pdo_common::KeyedLocks;
use tracing::{debug, info, info_span, instrument, warn, Span};

use crate::client::{ApiError, Integration, PagerDutyApi, PagerDutyClient, Service};
use crate::{Error, Result, TicketingConfig};

/// Name of the integration Alertmanager sends events to
pub const INTEGRATION_NAME: &str = "V4 Alertmanager";
/// Integration type for Events API v2
pub const INTEGRATION_TYPE: &str = "events_api_v2_inbound_integration";
/// Alert creation mode for new services
const ALERT_CREATION: &str = "create_alerts_and_incidents";

/// Creates, adopts, reads and deletes cluster services in PagerDuty
pub struct ServiceProvisioner {
    api: Arc<dyn PagerDutyApi>,
    locks: KeyedLocks,
    span: Span,
}

impl ServiceProvisioner {
    /// Create a provisioner over the given API
    pub fn new(api: Arc<dyn PagerDutyApi>) -> Self {
        Self {
            api,
            locks: KeyedLocks::new(),
            span: info_span!("pagerduty_service"),
        }
    }

    /// Create a provisioner talking to the public PagerDuty API with the
    /// configured token
    pub fn for_config(config: &TicketingConfig) -> Result<Self> {
        let client = PagerDutyClient::new(config.api_key.clone())?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Emit all events of this provisioner inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Fetch a service by ID
    #[instrument(parent = &self.span, skip_all, fields(service_id = %service_id))]
    pub async fn get_service(&self, service_id: &str) -> Result<Service> {
        let service = self.api.get_service(service_id).await?;
        debug!(name = %service.name, "Fetched service");
        Ok(service)
    }

    /// Fetch the routing key of a service's integration
    ///
    /// An integration without a key yields an empty string.
    #[instrument(parent = &self.span, skip_all, fields(service_id = %service_id, integration_id = %integration_id))]
    pub async fn get_integration_key(
        &self,
        service_id: &str,
        integration_id: &str,
    ) -> Result<String> {
        let integration = self.api.get_integration(service_id, integration_id).await?;
        Ok(integration.integration_key.unwrap_or_default())
    }

    /// Ensure the cluster has a service and an integration
    ///
    /// The config is validated before any API call. On success
    /// `config.service_id` and `config.integration_id` are set and the
    /// integration ID is returned. Concurrent calls for the same cluster
    /// within this provisioner run one at a time.
    #[instrument(parent = &self.span, skip_all, fields(cluster = %config.cluster_id))]
    pub async fn provision(&self, config: &mut TicketingConfig) -> Result<String> {
        config.validate()?;
        let _guard = self.locks.lock(&config.cluster_id).await;

        let policy = self
            .api
            .get_escalation_policy(&config.escalation_policy_id)
            .await
            .map_err(|source| Error::PolicyNotFound {
                policy_id: config.escalation_policy_id.clone(),
                source,
            })?;

        let descriptor = Service {
            name: config.service_name(),
            description: config.service_description(),
            escalation_policy: policy.reference(),
            auto_resolve_timeout: Some(config.auto_resolve_timeout),
            acknowledgement_timeout: Some(config.acknowledge_timeout),
            alert_creation: Some(ALERT_CREATION.to_string()),
            ..Default::default()
        };

        let service = match self.api.create_service(&descriptor).await {
            Ok(service) => {
                info!(service_id = %service.id, "Created PagerDuty service");
                service
            }
            Err(e) if e.is_duplicate_name() => self.adopt(&descriptor.name, e).await?,
            Err(e) => return Err(e.into()),
        };
        config.service_id = service.id.clone();

        let integration = match find_integration(&service) {
            Some(existing) => {
                info!(
                    service_id = %service.id,
                    integration_id = %existing.id,
                    "Reusing existing integration"
                );
                existing.clone()
            }
            None => {
                self.api
                    .create_integration(&service.id, &integration_descriptor())
                    .await?
            }
        };
        config.integration_id = integration.id;

        Ok(config.integration_id.clone())
    }

    /// Delete a service by ID
    #[instrument(parent = &self.span, skip_all, fields(service_id = %service_id))]
    pub async fn deprovision(&self, service_id: &str) -> Result<()> {
        self.api.delete_service(service_id).await?;
        info!("Deleted PagerDuty service");
        Ok(())
    }

    /// Find the service that holds `name` after a duplicate-name rejection
    ///
    /// If nothing can be adopted the original rejection is returned.
    async fn adopt(&self, name: &str, rejection: ApiError) -> Result<Service> {
        let candidates = match self.api.list_services(name).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to list services after duplicate name");
                return Err(rejection.into());
            }
        };

        match candidates.into_iter().find(|s| s.name == name) {
            Some(service) => {
                info!(name = %name, service_id = %service.id, "Adopted existing PagerDuty service");
                Ok(service)
            }
            None => Err(rejection.into()),
        }
    }
}

fn integration_descriptor() -> Integration {
    Integration {
        name: INTEGRATION_NAME.to_string(),
        kind: INTEGRATION_TYPE.to_string(),
        ..Default::default()
    }
}

/// An integration on `service` that provisioning would otherwise create again
fn find_integration(service: &Service) -> Option<&Integration> {
    service
        .integrations
        .iter()
        .find(|i| !i.id.is_empty() && i.name == INTEGRATION_NAME && i.kind == INTEGRATION_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EscalationPolicy, MockPagerDutyApi};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const NAME: &str = "osd-c1.example.com-hive-cluster";

    fn config() -> TicketingConfig {
        TicketingConfig {
            escalation_policy_id: "PEP1".to_string(),
            auto_resolve_timeout: 300,
            acknowledge_timeout: 600,
            api_key: "key".to_string(),
            ..TicketingConfig::new("c1", "example.com")
        }
    }

    fn policy_ok(mock: &mut MockPagerDutyApi) {
        mock.expect_get_escalation_policy()
            .withf(|id| id == "PEP1")
            .times(1)
            .returning(|id| {
                Ok(EscalationPolicy {
                    id: id.to_string(),
                    name: "SRE".to_string(),
                })
            });
    }

    fn service(id: &str, name: &str) -> Service {
        Service {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn integration(id: &str) -> Integration {
        Integration {
            id: id.to_string(),
            name: INTEGRATION_NAME.to_string(),
            kind: INTEGRATION_TYPE.to_string(),
            integration_key: Some(format!("key-{}", id)),
        }
    }

    fn duplicate() -> ApiError {
        ApiError::DuplicateName {
            message: "Name has already been taken.".to_string(),
        }
    }

    fn provisioner(mock: MockPagerDutyApi) -> ServiceProvisioner {
        ServiceProvisioner::new(Arc::new(mock))
    }

    /// Story: a new cluster gets a service and one integration
    #[tokio::test]
    async fn story_new_cluster_creates_service_and_integration() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service()
            .withf(|s| {
                s.name == NAME
                    && s.description == "c1 - A managed hive created cluster"
                    && s.escalation_policy.id == "PEP1"
                    && s.escalation_policy.kind == "escalation_policy_reference"
                    && s.auto_resolve_timeout == Some(300)
                    && s.acknowledgement_timeout == Some(600)
                    && s.alert_creation.as_deref() == Some(ALERT_CREATION)
            })
            .times(1)
            .returning(|s| Ok(service("PNEW", &s.name)));
        mock.expect_list_services().times(0);
        mock.expect_create_integration()
            .withf(|service_id, i| {
                service_id == "PNEW" && i.name == INTEGRATION_NAME && i.kind == INTEGRATION_TYPE
            })
            .times(1)
            .returning(|_, _| Ok(integration("PINT")));

        let mut config = config();
        let integration_id = provisioner(mock).provision(&mut config).await.unwrap();

        assert_eq!(integration_id, "PINT");
        assert_eq!(config.service_id, "PNEW");
        assert_eq!(config.integration_id, "PINT");
    }

    /// Story: a name collision adopts the exact-name match instead of failing
    #[tokio::test]
    async fn story_duplicate_name_adopts_existing_service() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service()
            .times(1)
            .returning(|_| Err(duplicate()));
        mock.expect_list_services()
            .withf(|query| query == NAME)
            .times(1)
            .returning(|_| {
                Ok(vec![
                    service("PPREFIX", &format!("{}-old", NAME)),
                    service("PEXACT", NAME),
                    service("PLATER", NAME),
                ])
            });
        mock.expect_create_integration()
            .withf(|service_id, _| service_id == "PEXACT")
            .times(1)
            .returning(|_, _| Ok(integration("PINT")));

        let mut config = config();
        let integration_id = provisioner(mock).provision(&mut config).await.unwrap();

        assert_eq!(integration_id, "PINT");
        assert_eq!(config.service_id, "PEXACT");
    }

    /// Story: retrying after a partial failure reuses the integration that
    /// was already created on the adopted service
    #[tokio::test]
    async fn story_adopted_service_with_integration_is_reused() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service()
            .times(1)
            .returning(|_| Err(duplicate()));
        mock.expect_list_services().times(1).returning(|_| {
            let mut existing = service("PEXACT", NAME);
            existing.integrations = vec![
                Integration {
                    id: "PEMAIL".to_string(),
                    name: "Email".to_string(),
                    kind: "generic_email_inbound_integration".to_string(),
                    integration_key: None,
                },
                integration("PINT-OLD"),
            ];
            Ok(vec![existing])
        });
        mock.expect_create_integration().times(0);

        let mut config = config();
        let integration_id = provisioner(mock).provision(&mut config).await.unwrap();

        assert_eq!(integration_id, "PINT-OLD");
        assert_eq!(config.service_id, "PEXACT");
        assert_eq!(config.integration_id, "PINT-OLD");
    }

    /// Story: a collision with no exact match returns the collision error
    #[tokio::test]
    async fn story_duplicate_name_without_exact_match_fails() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service()
            .times(1)
            .returning(|_| Err(duplicate()));
        mock.expect_list_services()
            .times(1)
            .returning(|_| Ok(vec![service("POTHER", "osd-c1.example.com-hive-cluster-2")]));
        mock.expect_create_integration().times(0);

        let mut config = config();
        let err = provisioner(mock).provision(&mut config).await.unwrap_err();

        assert!(matches!(err, Error::Api(ref e) if e.is_duplicate_name()));
        assert!(config.service_id.is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_after_collision_returns_collision_error() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service()
            .times(1)
            .returning(|_| Err(duplicate()));
        mock.expect_list_services().times(1).returning(|_| {
            Err(ApiError::Http {
                status: 500,
                message: "boom".to_string(),
                errors: vec![],
            })
        });
        mock.expect_create_integration().times(0);

        let err = provisioner(mock)
            .provision(&mut config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::DuplicateName { .. })));
    }

    /// Story: an unknown escalation policy stops provisioning before any
    /// service is created
    #[tokio::test]
    async fn story_missing_policy_aborts_before_create() {
        let mut mock = MockPagerDutyApi::new();
        mock.expect_get_escalation_policy()
            .times(1)
            .returning(|id| {
                Err(ApiError::NotFound {
                    resource: "escalation policy",
                    id: id.to_string(),
                })
            });
        mock.expect_create_service().times(0);
        mock.expect_create_integration().times(0);

        let err = provisioner(mock)
            .provision(&mut config())
            .await
            .unwrap_err();
        match err {
            Error::PolicyNotFound { policy_id, source } => {
                assert_eq!(policy_id, "PEP1");
                assert!(source.is_not_found());
            }
            other => panic!("Expected PolicyNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_create_errors_pass_through() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service().times(1).returning(|_| {
            Err(ApiError::Http {
                status: 403,
                message: "Forbidden".to_string(),
                errors: vec![],
            })
        });
        mock.expect_list_services().times(0);
        mock.expect_create_integration().times(0);

        let err = provisioner(mock)
            .provision(&mut config())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Api(ApiError::Http { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_integration_failure_keeps_service_id() {
        let mut mock = MockPagerDutyApi::new();
        policy_ok(&mut mock);
        mock.expect_create_service()
            .times(1)
            .returning(|s| Ok(service("PNEW", &s.name)));
        mock.expect_create_integration().times(1).returning(|_, _| {
            Err(ApiError::Http {
                status: 500,
                message: "Internal Server Error".to_string(),
                errors: vec![],
            })
        });

        let mut config = config();
        let err = provisioner(mock).provision(&mut config).await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Http { status: 500, .. })));
        assert_eq!(config.service_id, "PNEW");
        assert!(config.integration_id.is_empty());
    }

    #[tokio::test]
    async fn test_lookups_and_delete_pass_through() {
        let mut mock = MockPagerDutyApi::new();
        mock.expect_get_service()
            .withf(|id| id == "PSVC")
            .returning(|id| Ok(service(id, NAME)));
        mock.expect_get_integration()
            .withf(|service_id, integration_id| service_id == "PSVC" && integration_id == "PINT")
            .returning(|_, id| Ok(integration(id)));
        mock.expect_delete_service()
            .withf(|id| id == "PSVC")
            .times(1)
            .returning(|_| Ok(()));

        let provisioner = provisioner(mock).with_span(info_span!("test"));
        assert_eq!(provisioner.get_service("PSVC").await.unwrap().name, NAME);
        assert_eq!(
            provisioner
                .get_integration_key("PSVC", "PINT")
                .await
                .unwrap(),
            "key-PINT"
        );
        provisioner.deprovision("PSVC").await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_not_found_passes_through() {
        let mut mock = MockPagerDutyApi::new();
        mock.expect_get_service().returning(|id| {
            Err(ApiError::NotFound {
                resource: "service",
                id: id.to_string(),
            })
        });
        mock.expect_delete_service().returning(|id| {
            Err(ApiError::NotFound {
                resource: "service",
                id: id.to_string(),
            })
        });

        let provisioner = provisioner(mock);
        let err = provisioner.get_service("PGONE").await.unwrap_err();
        assert!(err.api_error().is_some_and(ApiError::is_not_found));
        let err = provisioner.deprovision("PGONE").await.unwrap_err();
        assert!(err.api_error().is_some_and(ApiError::is_not_found));
    }

    #[test]
    fn test_find_integration_ignores_other_types() {
        let mut svc = service("P", NAME);
        assert!(find_integration(&svc).is_none());

        svc.integrations.push(Integration {
            id: "PX".to_string(),
            name: INTEGRATION_NAME.to_string(),
            kind: "generic_events_api_inbound_integration".to_string(),
            integration_key: None,
        });
        assert!(find_integration(&svc).is_none());

        svc.integrations.push(integration("PY"));
        assert_eq!(find_integration(&svc).map(|i| i.id.as_str()), Some("PY"));
    }

    /// Story: a config without a cluster identity never reaches PagerDuty
    #[tokio::test]
    async fn story_empty_cluster_identity_is_rejected_before_any_call() {
        let mut mock = MockPagerDutyApi::new();
        mock.expect_get_escalation_policy().times(0);
        mock.expect_create_service().times(0);
        mock.expect_create_integration().times(0);

        let mut config = TicketingConfig {
            cluster_id: String::new(),
            base_domain: String::new(),
            ..config()
        };
        let err = provisioner(mock).provision(&mut config).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Config(pdo_common::Error::EmptyValue { ref key, .. }) if key == "cluster_id"
        ));
        assert!(config.service_id.is_empty());
        assert!(config.integration_id.is_empty());
    }

    /// API double whose policy lookup yields for a while and records how many
    /// calls overlap
    #[derive(Default)]
    struct SlowPolicyApi {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        created: AtomicUsize,
    }

    fn unused() -> ApiError {
        ApiError::Decode("unexpected call".to_string())
    }

    #[async_trait::async_trait]
    impl PagerDutyApi for SlowPolicyApi {
        async fn get_service(&self, _id: &str) -> std::result::Result<Service, ApiError> {
            Err(unused())
        }

        async fn get_integration(
            &self,
            _service_id: &str,
            _integration_id: &str,
        ) -> std::result::Result<Integration, ApiError> {
            Err(unused())
        }

        async fn get_escalation_policy(
            &self,
            id: &str,
        ) -> std::result::Result<EscalationPolicy, ApiError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(EscalationPolicy {
                id: id.to_string(),
                name: "SRE".to_string(),
            })
        }

        async fn create_service(&self, s: &Service) -> std::result::Result<Service, ApiError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(service(&format!("PSVC{}", n), &s.name))
        }

        async fn list_services(&self, _query: &str) -> std::result::Result<Vec<Service>, ApiError> {
            Err(unused())
        }

        async fn create_integration(
            &self,
            _service_id: &str,
            _integration: &Integration,
        ) -> std::result::Result<Integration, ApiError> {
            Ok(integration("PINT"))
        }

        async fn delete_service(&self, _id: &str) -> std::result::Result<(), ApiError> {
            Err(unused())
        }
    }

    /// Story: concurrent provisioning of one cluster runs one call at a time
    #[tokio::test]
    async fn story_same_cluster_provisions_serially() {
        let api = Arc::new(SlowPolicyApi::default());
        let provisioner = ServiceProvisioner::new(api.clone());

        let mut first = config();
        let mut second = config();
        let (a, b) = tokio::join!(
            provisioner.provision(&mut first),
            provisioner.provision(&mut second)
        );

        assert_eq!(a.unwrap(), "PINT");
        assert_eq!(b.unwrap(), "PINT");
        assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(api.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_different_clusters_provision_in_parallel() {
        let api = Arc::new(SlowPolicyApi::default());
        let provisioner = ServiceProvisioner::new(api.clone());

        let mut first = config();
        let mut second = TicketingConfig {
            cluster_id: "c2".to_string(),
            ..config()
        };
        let (a, b) = tokio::join!(
            provisioner.provision(&mut first),
            provisioner.provision(&mut second)
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 2);
    }
}
