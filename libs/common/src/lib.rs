//! Common library for the Larder services
//!
//! This crate provides shared infrastructure used by the auth, api and media
//! services: PostgreSQL connectivity and migrations, the Redis cache, and the
//! S3-backed object storage holding recipe and collection cover images.

pub mod cache;
pub mod database;
pub mod error;
pub mod storage;

/// Example usage of the database and storage modules
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool, run_migrations};
/// use common::storage::{ObjectStorage, StorageConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
///     run_migrations(&pool).await?;
///
///     let storage = ObjectStorage::connect(&StorageConfig::from_env()).await;
///     let url = storage.signed_url("recipes/u/r/cover.jpg", 3600).await?;
///     println!("{}", url);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
