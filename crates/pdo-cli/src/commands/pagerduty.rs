//! PagerDuty commands
//!
//! Credentials always come from the `pagerduty-api-key` Secret; stored IDs come
//! from the cluster's `{cluster}-pd-config` ConfigMap.

use std::sync::Arc;

use clap::{Args, Subcommand};
use pdo_common::ConfigSource;
use pdo_pagerduty::{PagerDutyClient, ServiceProvisioner, TicketingConfig, DEFAULT_API_URL};
use tracing::info;

use crate::Result;

#[derive(Subcommand, Debug)]
pub enum PagerDutyCommand {
    /// Create or adopt the cluster's service and integration
    Provision(ProvisionArgs),
    /// Show the cluster's service
    Service(ClusterArgs),
    /// Print the routing key of the cluster's integration
    IntegrationKey(ClusterArgs),
    /// Delete the cluster's service
    Deprovision(ClusterArgs),
}

/// PagerDuty endpoint selection
#[derive(Args, Debug)]
pub struct ApiArgs {
    /// PagerDuty REST API base URL
    #[arg(long, env = "PAGERDUTY_API_URL", default_value = DEFAULT_API_URL)]
    pub pagerduty_url: String,
}

/// Arguments for provisioning
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// Cluster identifier
    #[arg(long)]
    pub cluster_id: String,

    /// Cluster base DNS domain
    #[arg(long)]
    pub base_domain: String,

    #[command(flatten)]
    pub api: ApiArgs,
}

/// Arguments identifying an already provisioned cluster
#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Namespace holding the cluster's PagerDuty ConfigMap
    #[arg(long, short = 'n')]
    pub namespace: String,

    /// Cluster name (the ConfigMap is `<name>-pd-config`)
    #[arg(long)]
    pub cluster_name: String,

    #[command(flatten)]
    pub api: ApiArgs,
}

/// Resolve credentials plus the stored IDs of an existing cluster
pub async fn load_cluster_config(
    source: &dyn ConfigSource,
    namespace: &str,
    cluster_name: &str,
) -> Result<TicketingConfig> {
    let mut config = TicketingConfig::default();
    config.parse_pd_config(source).await?;
    config
        .parse_cluster_config(source, namespace, cluster_name)
        .await?;
    Ok(config)
}

fn provisioner(config: &TicketingConfig, api: &ApiArgs) -> Result<ServiceProvisioner> {
    let client = PagerDutyClient::with_base_url(config.api_key.clone(), api.pagerduty_url.clone())
        .map_err(pdo_pagerduty::Error::from)?;
    Ok(ServiceProvisioner::new(Arc::new(client)))
}

/// Run a PagerDuty command
pub async fn run(cmd: PagerDutyCommand, source: &dyn ConfigSource) -> Result<()> {
    match cmd {
        PagerDutyCommand::Provision(args) => {
            let mut config = TicketingConfig::new(args.cluster_id, args.base_domain);
            config.parse_pd_config(source).await?;

            let integration_id = provisioner(&config, &args.api)?
                .provision(&mut config)
                .await?;
            info!(cluster = %config.cluster_id, "Provisioned PagerDuty service");
            println!("SERVICE_ID={}", config.service_id);
            println!("INTEGRATION_ID={}", integration_id);
        }
        PagerDutyCommand::Service(args) => {
            let config = load_cluster_config(source, &args.namespace, &args.cluster_name).await?;
            let service = provisioner(&config, &args.api)?
                .get_service(&config.service_id)
                .await?;
            println!("{}\t{}", service.id, service.name);
        }
        PagerDutyCommand::IntegrationKey(args) => {
            let config = load_cluster_config(source, &args.namespace, &args.cluster_name).await?;
            let key = provisioner(&config, &args.api)?
                .get_integration_key(&config.service_id, &config.integration_id)
                .await?;
            println!("{}", key);
        }
        PagerDutyCommand::Deprovision(args) => {
            let config = load_cluster_config(source, &args.namespace, &args.cluster_name).await?;
            provisioner(&config, &args.api)?
                .deprovision(&config.service_id)
                .await?;
            println!("deleted {}", config.service_id);
        }
    }
    Ok(())
}
