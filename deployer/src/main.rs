//! urbancycle-deploy - bootstrap the UrbanCycle contracts
//!
//! Deploys UrbanCoin, WasteNFT and RecycleManager, wires them together and
//! writes the resulting addresses as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use urbancycle_common::types::address_to_hex;
use urbancycle_deployer::{BootstrapSequencer, DeployConfig};

/// urbancycle-deploy - bootstrap the UrbanCycle contracts
#[derive(Parser, Debug)]
#[command(name = "urbancycle-deploy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to deployment configuration file
    #[arg(short, long, default_value = "urbancycle.toml")]
    config: PathBuf,

    /// Where to write the address book
    #[arg(short, long, default_value = "deployments.json")]
    out: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = DeployConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let (sequencer, deployer) = BootstrapSequencer::from_config(&config).context("invalid configuration")?;
    info!(deployer = %address_to_hex(&deployer), "starting bootstrap");

    let deployment = sequencer.run(deployer).context("bootstrap failed")?;
    let book = deployment.address_book();
    book.save(&cli.out)
        .with_context(|| format!("failed to write {}", cli.out.display()))?;

    info!(path = %cli.out.display(), "address book written");
    println!("{}", book.to_json()?);
    Ok(())
}
