//! Application state shared across handlers

use common::{cache::RedisCache, storage::ObjectStorage};
use sqlx::PgPool;

use crate::{
    middleware::TokenVerifier,
    repositories::{CollectionRepository, LinkRepository, RecipeRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub recipe_repository: RecipeRepository,
    pub collection_repository: CollectionRepository,
    pub link_repository: LinkRepository,
    pub storage: ObjectStorage,
    /// Default signed URL lifetime in seconds
    pub signed_url_ttl: u64,
    pub cache: RedisCache,
    pub verifier: TokenVerifier,
}
