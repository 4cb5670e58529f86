//! Listener configuration for the API service

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// API listener settings, read from `API_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    /// Load the configuration
    ///
    /// # Environment Variables
    /// - `API_HOST`: Bind address (default: "0.0.0.0")
    /// - `API_PORT`: Bind port (default: 3001)
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001_i64)?
            .add_source(Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
