//! pdo CLI library

pub mod commands;
pub mod error;

use std::path::PathBuf;

pub use error::{Error, Result};

use clap::{Parser, Subcommand, ValueEnum};
use pdo_common::telemetry::{init_tracing, LogFormat, TracingConfig};

/// PagerDuty operator helpers
#[derive(Parser, Debug)]
#[command(name = "pdo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to kubeconfig (defaults to in-cluster or ambient config)
    #[arg(long, global = true, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "plain", env = "PDO_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log output format flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human readable lines
    Plain,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Plain => LogFormat::Plain,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage a cluster's PagerDuty service
    #[command(subcommand)]
    Pagerduty(commands::pagerduty::PagerDutyCommand),

    /// Read secrets from Vault
    #[command(subcommand)]
    Vault(commands::vault::VaultCommand),
}

impl Cli {
    /// Install the tracing subscriber for this invocation
    pub fn init_tracing(&self) -> Result<()> {
        init_tracing(TracingConfig {
            format: self.log_format.into(),
            filter: None,
        })?;
        Ok(())
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let source = pdo_common::KubeConfigSource::connect(self.kubeconfig.as_deref()).await?;
        match self.command {
            Commands::Pagerduty(cmd) => commands::pagerduty::run(cmd, &source).await,
            Commands::Vault(cmd) => commands::vault::run(cmd, &source).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_provision() {
        let cli = Cli::try_parse_from([
            "pdo",
            "--log-format",
            "json",
            "pagerduty",
            "provision",
            "--cluster-id",
            "c1",
            "--base-domain",
            "example.com",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormatArg::Json);
        match cli.command {
            Commands::Pagerduty(commands::pagerduty::PagerDutyCommand::Provision(args)) => {
                assert_eq!(args.cluster_id, "c1");
                assert_eq!(args.base_domain, "example.com");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_vault_get() {
        let cli = Cli::try_parse_from([
            "pdo",
            "vault",
            "get",
            "--namespace",
            "ops",
            "--secret-name",
            "vault-creds",
        ])
        .unwrap();
        match cli.command {
            Commands::Vault(commands::vault::VaultCommand::Get(args)) => {
                assert_eq!(args.namespace, "ops");
                assert_eq!(args.secret_name, "vault-creds");
                assert!(args.cache_dir.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
