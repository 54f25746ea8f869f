//! pdo - PagerDuty operator helper CLI

use clap::Parser;

use pdo_cli::{Cli, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_tracing()?;
    cli.run().await
}
