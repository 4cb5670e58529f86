//! Client configuration

use std::env;

/// Base URLs of the auth and API services
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub auth_url: String,
    pub api_url: String,
}

impl ClientConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let auth_url =
            env::var("LARDER_AUTH_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let api_url =
            env::var("LARDER_API_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

        Self {
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}
