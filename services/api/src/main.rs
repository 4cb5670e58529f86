use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod config;
mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;
mod storage;

use common::{
    cache::{RedisCache, RedisConfig},
    database::{self, DatabaseConfig},
    storage::{ObjectStorage, StorageConfig},
};
use tokio::net::TcpListener;

use crate::{
    config::ApiConfig,
    middleware::{TokenVerifier, public_key_from_env},
    repositories::{CollectionRepository, LinkRepository, RecipeRepository},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting API service");

    let api_config = ApiConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let verifier = TokenVerifier::from_rsa_pem(&public_key_from_env()?)?;

    let redis_config = RedisConfig::from_env()?;
    let cache = RedisCache::new(&redis_config).await?;

    let storage_config = StorageConfig::from_env();
    let storage = ObjectStorage::connect(&storage_config).await;

    let app_state = AppState {
        recipe_repository: RecipeRepository::new(pool.clone()),
        collection_repository: CollectionRepository::new(pool.clone()),
        link_repository: LinkRepository::new(pool.clone()),
        db_pool: pool,
        storage,
        signed_url_ttl: storage_config.signed_url_ttl,
        cache,
        verifier,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let address = api_config.address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
