//! Config Validator CLI
//!
//! Validates a model configuration file against the current schema.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use trellis_config::{upgrade_config_to_latest_version, validate_config};

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate a model configuration document")]
struct Cli {
    /// Path to the configuration file (YAML or JSON)
    config: PathBuf,

    /// Print the upgraded document on success
    #[arg(long)]
    upgraded: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read {}", cli.config.display()))?;
    let config: serde_yaml::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", cli.config.display()))?;

    validate_config(&config)?;
    println!("✅ {} is valid", cli.config.display());

    if cli.upgraded {
        let upgraded = upgrade_config_to_latest_version(&config)?;
        print!("{}", serde_yaml::to_string(&upgraded)?);
    }
    Ok(())
}
