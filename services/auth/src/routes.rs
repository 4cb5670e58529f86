//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::database;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    AppState,
    error::{AuthError, AuthResult},
    jwt::{Claims, TokenPair, TokenType, remaining_lifetime},
    middleware::{AuthUser, auth_middleware},
    models::{Credentials, User, UserResponse},
    repositories::user::{hash_password, verify_password},
    validation::{normalize_email, validate_email, validate_password},
};

/// Tokens plus the signed-in user
#[derive(Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Request for token refresh and logout
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/session", get(session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = matches!(database::health_check(&state.db_pool).await, Ok(true));

    Json(serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "auth-service"
    }))
}

fn session_key(user: &User) -> String {
    format!("session:{}", user.id)
}

/// Store the refresh token as the user's current session
async fn open_session(state: &AppState, user: &User, tokens: TokenPair) -> AuthResult<SessionResponse> {
    state
        .cache
        .set(
            &session_key(user),
            &tokens.refresh_token,
            Some(state.jwt_service.refresh_token_expiry()),
        )
        .await?;

    Ok(SessionResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        user: UserResponse::from(user),
    })
}

/// Validate a refresh token that has not been revoked
async fn refresh_claims(state: &AppState, token: &str) -> AuthResult<Claims> {
    let claims = state
        .jwt_service
        .validate_token(token)
        .map_err(|_| AuthError::Unauthorized)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AuthError::Unauthorized);
    }

    if state
        .jwt_service
        .is_token_blacklisted(&state.cache, token)
        .await?
    {
        return Err(AuthError::Unauthorized);
    }

    Ok(claims)
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> AuthResult<impl IntoResponse> {
    let email = normalize_email(&payload.email);
    validate_email(&email).map_err(AuthError::BadRequest)?;
    validate_password(&payload.password).map_err(AuthError::BadRequest)?;

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .user_repository
        .create(&email, &password_hash)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                AuthError::Conflict("Email already registered".to_string())
            } else {
                AuthError::from(e)
            }
        })?;

    info!("Registered user {}", user.id);
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> AuthResult<impl IntoResponse> {
    let email = normalize_email(&payload.email);
    info!("Login attempt for user: {}", email);

    let user = state
        .user_repository
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    if !verify_password(&user.password_hash, &payload.password)? {
        warn!("Invalid password for user {}", user.id);
        return Err(AuthError::Unauthorized);
    }

    let tokens = state.jwt_service.generate_pair(&user)?;
    let response = open_session(&state, &user, tokens).await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Refresh token endpoint; rotates the refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    info!("Token refresh request");

    let claims = refresh_claims(&state, &payload.refresh_token).await?;

    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    let tokens = state
        .jwt_service
        .rotate(&state.cache, &user, &payload.refresh_token, &claims)
        .await?;
    let response = open_session(&state, &user, tokens).await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<impl IntoResponse> {
    info!("Logout request");

    let claims = refresh_claims(&state, &payload.refresh_token).await?;

    let expiry = remaining_lifetime(&claims)?;
    state
        .jwt_service
        .blacklist_token(&state.cache, &payload.refresh_token, expiry)
        .await?;

    let key = format!("session:{}", claims.sub);
    state.cache.delete(&[key.as_str()]).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Current user behind the bearer token
pub async fn session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AuthResult<impl IntoResponse> {
    let user = state
        .user_repository
        .find_by_id(auth.id)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(Json(UserResponse::from(&user)))
}
