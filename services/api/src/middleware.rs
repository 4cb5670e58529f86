//! Authentication middleware for JWT token validation
//!
//! The auth service signs tokens with its private key; this service only holds
//! the public key and never talks to the auth service.

use anyhow::Result;
use axum::{
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Subset of the auth service claims this service relies on
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    pub exp: u64,
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Authenticated owner, inserted into the request extensions
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Read `JWT_PUBLIC_KEY`, given inline or as a path to a PEM file
pub fn public_key_from_env() -> Result<String> {
    let value = std::env::var("JWT_PUBLIC_KEY")
        .map_err(|_| anyhow::anyhow!("JWT_PUBLIC_KEY environment variable not set"))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let key = std::fs::read_to_string(&value)
        .map_err(|e| anyhow::anyhow!("Failed to read public key file {}: {}", value, e))?;
    Ok(key.trim().to_string())
}

/// Verifies RS256 access tokens
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_rsa_pem(public_key: &str) -> Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Decode an access token; refresh tokens are refused
    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                ApiError::Unauthorized
            })?;

        if data.claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser {
            id: data.claims.sub,
        })
    }
}

/// Bearer token from an `Authorization` header value
fn bearer(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer)
        .ok_or(ApiError::Unauthorized)?;

    let user = state.verifier.verify(token)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer("Bearer "), None);
        assert_eq!(bearer("Basic abc"), None);
    }

    #[test]
    fn test_claims_ignore_auth_only_fields() {
        let sub = Uuid::new_v4();
        let claims: Claims = serde_json::from_value(json!({
            "sub": sub,
            "email": "cook@example.com",
            "iat": 1,
            "exp": 2,
            "jti": Uuid::new_v4(),
            "token_type": "Access",
        }))
        .unwrap();

        assert_eq!(claims.sub, sub);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_invalid_pem_is_rejected() {
        assert!(TokenVerifier::from_rsa_pem("not a key").is_err());
    }

    #[test]
    #[serial]
    fn test_public_key_required() {
        unsafe {
            std::env::remove_var("JWT_PUBLIC_KEY");
        }
        assert!(public_key_from_env().is_err());

        unsafe {
            std::env::set_var("JWT_PUBLIC_KEY", "-----BEGIN PUBLIC KEY-----");
        }
        assert_eq!(public_key_from_env().unwrap(), "-----BEGIN PUBLIC KEY-----");

        unsafe {
            std::env::remove_var("JWT_PUBLIC_KEY");
        }
    }
}
