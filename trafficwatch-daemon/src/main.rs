use anyhow::Result;
use clap::Parser;

use trafficwatch_daemon::cli::DaemonCli;
use trafficwatch_daemon::logging;
use trafficwatch_daemon::orchestrator::{Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "trafficwatch starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("trafficwatch shut down");
    Ok(())
}
