//! tokenstash operator entry point.
//!
//! Opens the durable cache named by the configuration and prints results as
//! JSON on stdout. Logging goes to stderr so output stays machine-readable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokenstash_core::{CacheConfig, CacheManager};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "tokenstash", version, about = "Inspect and clear a tokenstash credential cache")]
struct Cli {
    /// Client whose cache is opened. Overrides `TOKENSTASH_CLIENT_ID`.
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// SQLite file backing the durable scopes. Overrides `TOKENSTASH_DB_PATH`.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> Result<CacheConfig> {
        let mut config = CacheConfig::extract()?;
        if let Some(client_id) = &self.client_id {
            config.client_id = client_id.clone();
        }
        if let Some(db_path) = &self.db_path {
            config.db_path = db_path.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    tracing::info!(client_id = %config.client_id, db_path = %config.db_path.display(), "opening cache");

    let manager = CacheManager::open(config).await.context("failed to open cache")?;
    let output = commands::run(&manager, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
