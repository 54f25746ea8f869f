//! Vault commands

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use pdo_common::ConfigSource;
use pdo_vault::{get_vault_secret, SecretCache};

use crate::{Error, Result};

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Print a secret value, using the local cache when fresh
    Get(GetArgs),
}

/// Arguments for reading a secret
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Namespace of the Secret holding Vault connection parameters
    #[arg(long, short = 'n')]
    pub namespace: String,

    /// Name of the Secret holding Vault connection parameters
    #[arg(long)]
    pub secret_name: String,

    /// Directory for cache files, created if missing (defaults to the system
    /// temp dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

/// Run a Vault command
pub async fn run(cmd: VaultCommand, source: &dyn ConfigSource) -> Result<()> {
    match cmd {
        VaultCommand::Get(args) => {
            let mut cache = SecretCache::with_default_client()?;
            if let Some(dir) = args.cache_dir {
                prepare_cache_dir(&dir).await?;
                cache = cache.with_cache_dir(dir);
            }
            let secret =
                get_vault_secret(source, &cache, &args.namespace, &args.secret_name).await?;
            println!("{}", secret);
        }
    }
    Ok(())
}

/// Create the cache directory and any missing parents
pub async fn prepare_cache_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::Io {
            context: format!("failed to create cache directory {}", dir.display()),
            source,
        })
}
