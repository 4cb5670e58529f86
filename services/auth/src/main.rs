use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod error;
mod jwt;
mod middleware;
mod models;
mod repositories;
mod routes;
mod validation;

use common::{
    cache::{RedisCache, RedisConfig},
    database::{self, DatabaseConfig},
};
use sqlx::PgPool;

use crate::{
    jwt::{JwtConfig, JwtService},
    repositories::UserRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub cache: RedisCache,
    pub jwt_service: JwtService,
    pub user_repository: UserRepository,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let redis_config = RedisConfig::from_env()?;
    let cache = RedisCache::new(&redis_config).await?;

    let app_state = AppState {
        user_repository: UserRepository::new(pool.clone()),
        db_pool: pool,
        cache,
        jwt_service,
    };

    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Authentication service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
