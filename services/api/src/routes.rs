//! API service routes

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use common::{database, error::DatabaseError};
use cookbook::{
    image::MAX_IMAGE_BYTES,
    models::{CollectionPatch, NewCollection, NewRecipe, RecipePatch},
};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{
        LinksRequest, LookupRequest, RecentQuery, RemoveRequest, SignRequest, SignedUrlResponse,
        SlugQuery,
    },
    state::AppState,
    storage::{
        authorize_path, decode_cached_url, encode_cached_url, signed_url_cache_key,
        signed_url_cache_ttl, signed_url_lifetime, upload_kind,
    },
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/recipes", get(recent_recipes).post(create_recipe))
        .route("/recipes/slugs", get(recipe_slugs))
        .route("/recipes/lookup", post(lookup_recipes))
        .route("/recipes/by-slug/:slug", get(recipe_by_slug))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/links",
            get(recipe_links).delete(clear_recipe_links),
        )
        .route("/collections", get(list_collections).post(create_collection))
        .route(
            "/collections/:id",
            get(get_collection)
                .patch(update_collection)
                .delete(delete_collection),
        )
        .route(
            "/collections/:id/links",
            get(collection_links).delete(clear_collection_links),
        )
        .route("/links", post(insert_links))
        .route("/links/delete", post(delete_links))
        .route("/storage/remove", post(remove_objects))
        .route("/storage/sign", post(sign_object))
        .route(
            "/storage/*path",
            put(upload_object).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = matches!(database::health_check(&state.db_pool).await, Ok(true));
    let cache = matches!(state.cache.health_check().await, Ok(true));

    Json(json!({
        "status": if database && cache { "ok" } else { "degraded" },
        "service": "api-service",
        "database": database,
        "cache": cache,
    }))
}

fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

fn slug_conflict(err: DatabaseError) -> ApiError {
    if err.is_unique_violation() {
        ApiError::Conflict("Slug already in use".to_string())
    } else {
        ApiError::from(err)
    }
}

// Recipes

/// Recent recipe summaries
pub async fn recent_recipes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<impl IntoResponse> {
    let recipes = state
        .recipe_repository
        .recent(user.id, query.limit.map(i64::from))
        .await?;

    Ok(Json(recipes))
}

/// Slugs sharing a prefix, used for unique slug assignment
pub async fn recipe_slugs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SlugQuery>,
) -> ApiResult<impl IntoResponse> {
    let slugs = state
        .recipe_repository
        .slugs_with_prefix(user.id, &query.prefix)
        .await?;

    Ok(Json(slugs))
}

pub async fn lookup_recipes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<LookupRequest>,
) -> ApiResult<impl IntoResponse> {
    let recipes = state
        .recipe_repository
        .find_by_ids(user.id, &payload.ids)
        .await?;

    Ok(Json(recipes))
}

pub async fn recipe_by_slug(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let recipe = state
        .recipe_repository
        .find_by_slug(user.id, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))?;

    Ok(Json(recipe))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let recipe = state
        .recipe_repository
        .find_by_id(user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))?;

    Ok(Json(recipe))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewRecipe>,
) -> ApiResult<impl IntoResponse> {
    require_text("Title", &payload.title)?;
    require_text("Slug", &payload.slug)?;

    let recipe = state
        .recipe_repository
        .create(user.id, &payload)
        .await
        .map_err(slug_conflict)?;

    info!("Created recipe {} ({})", recipe.id, recipe.slug);
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<RecipePatch>,
) -> ApiResult<impl IntoResponse> {
    if let Some(title) = &patch.title {
        require_text("Title", title)?;
    }
    if let Some(slug) = &patch.slug {
        require_text("Slug", slug)?;
    }
    if let Some(Some(path)) = &patch.image_path {
        authorize_path(user.id, path)?;
    }

    let recipe = state
        .recipe_repository
        .update(user.id, id, &patch)
        .await
        .map_err(slug_conflict)?
        .ok_or_else(|| ApiError::NotFound("Recipe not found".to_string()))?;

    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.recipe_repository.delete(user.id, id).await? {
        return Err(ApiError::NotFound("Recipe not found".to_string()));
    }

    info!("Deleted recipe {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recipe_links(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let links = state.link_repository.for_recipe(user.id, id).await?;
    Ok(Json(links))
}

pub async fn clear_recipe_links(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.link_repository.clear_recipe(user.id, id).await?;
    debug!("Cleared {} links of recipe {}", removed, id);
    Ok(StatusCode::NO_CONTENT)
}

// Collections

pub async fn list_collections(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let collections = state.collection_repository.list(user.id).await?;
    Ok(Json(collections))
}

pub async fn get_collection(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let collection = state
        .collection_repository
        .find_by_id(user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Collection not found".to_string()))?;

    Ok(Json(collection))
}

pub async fn create_collection(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewCollection>,
) -> ApiResult<impl IntoResponse> {
    require_text("Name", &payload.name)?;

    let collection = state
        .collection_repository
        .create(user.id, &payload)
        .await?;

    info!("Created collection {}", collection.id);
    Ok((StatusCode::CREATED, Json(collection)))
}

pub async fn update_collection(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CollectionPatch>,
) -> ApiResult<impl IntoResponse> {
    if let Some(name) = &patch.name {
        require_text("Name", name)?;
    }
    if let Some(Some(path)) = &patch.image_path {
        authorize_path(user.id, path)?;
    }

    let collection = state
        .collection_repository
        .update(user.id, id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Collection not found".to_string()))?;

    Ok(Json(collection))
}

pub async fn delete_collection(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !state.collection_repository.delete(user.id, id).await? {
        return Err(ApiError::NotFound("Collection not found".to_string()));
    }

    info!("Deleted collection {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn collection_links(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let links = state.link_repository.for_collection(user.id, id).await?;
    Ok(Json(links))
}

pub async fn clear_collection_links(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.link_repository.clear_collection(user.id, id).await?;
    debug!("Cleared {} links of collection {}", removed, id);
    Ok(StatusCode::NO_CONTENT)
}

// Links

/// Insert links; existing links are left untouched
pub async fn insert_links(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<LinksRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.links.is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }

    if !state
        .link_repository
        .owns_all(user.id, &payload.links)
        .await?
    {
        return Err(ApiError::NotFound(
            "Collection or recipe not found".to_string(),
        ));
    }

    let inserted = state.link_repository.insert(user.id, &payload.links).await?;
    debug!("Inserted {} of {} links", inserted, payload.links.len());
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_links(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<LinksRequest>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.link_repository.delete(user.id, &payload.links).await?;
    debug!("Removed {} links", removed);
    Ok(StatusCode::NO_CONTENT)
}

// Storage

/// Upsert a cover image at `path`
pub async fn upload_object(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    authorize_path(user.id, &path)?;
    let kind = upload_kind(
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
    )?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Image body is empty".to_string()));
    }

    state.storage.upload(&path, body.to_vec(), kind.mime()).await?;

    info!("Stored {} ({} bytes)", path, body.len());
    Ok(Json(json!({ "path": path })))
}

/// Remove objects and forget their cached signed URLs
pub async fn remove_objects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RemoveRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.paths.is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }
    for path in &payload.paths {
        authorize_path(user.id, path)?;
    }

    state.storage.remove(&payload.paths).await?;

    let keys: Vec<String> = payload
        .paths
        .iter()
        .map(|path| signed_url_cache_key(path))
        .collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    if let Err(e) = state.cache.delete(&keys).await {
        warn!("Failed to drop cached signed URLs: {}", e);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Signed download URL, served from Redis while it has enough lifetime left
pub async fn sign_object(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SignRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize_path(user.id, &payload.path)?;
    let expires_in = signed_url_lifetime(payload.expires_in, state.signed_url_ttl)?;
    let key = signed_url_cache_key(&payload.path);

    match state.cache.get(&key).await {
        Ok(Some(entry)) => {
            if let Some(url) = decode_cached_url(&entry, expires_in) {
                debug!("Signed URL cache hit for {}", payload.path);
                return Ok(Json(SignedUrlResponse {
                    signed_url: url.to_string(),
                }));
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Signed URL cache lookup failed: {}", e),
    }

    let signed_url = state
        .storage
        .signed_url(&payload.path, expires_in)
        .await?;

    if let Some(ttl) = signed_url_cache_ttl(expires_in) {
        let entry = encode_cached_url(expires_in, &signed_url);
        if let Err(e) = state.cache.set(&key, &entry, Some(ttl)).await {
            warn!("Failed to cache signed URL: {}", e);
        }
    }

    Ok(Json(SignedUrlResponse { signed_url }))
}
