//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::error;
use uuid::Uuid;

use crate::{AppState, jwt::TokenType};

/// Identity of the caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Extract and validate the access token from the Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let claims = state.jwt_service.validate_token(&token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    if claims.token_type != TokenType::Access {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let is_blacklisted = state
        .jwt_service
        .is_token_blacklisted(&state.cache, &token)
        .await
        .map_err(|e| {
            error!("Failed to check if token is blacklisted: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if is_blacklisted {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(req).await)
}
