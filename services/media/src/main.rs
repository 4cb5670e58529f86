use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod database;
mod sweeper;

use common::{
    database::{DatabaseConfig, init_pool},
    storage::{ObjectStorage, StorageConfig},
};
use config::SweepConfig;
use database::Database;
use sweeper::Sweeper;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting cover image sweeper");

    let sweep_config = SweepConfig::from_env()?;
    let storage = ObjectStorage::connect(&StorageConfig::from_env()).await;

    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    let database = Database::new(pool);

    let sweeper = Sweeper::new(storage, database, sweep_config.grace_seconds);
    let mut scheduler = sweeper.start(&sweep_config.schedule).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down cover image sweeper");
    scheduler.shutdown().await?;

    Ok(())
}
