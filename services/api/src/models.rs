//! API models for request and response payloads
//!
//! Entity types come from the `cookbook` crate so the client and the API
//! agree on the wire format.

use cookbook::models::Link;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query for recent recipe listings
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

/// Query for slug probes
#[derive(Debug, Deserialize)]
pub struct SlugQuery {
    pub prefix: String,
}

/// Request body for `POST /recipes/lookup`
#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub ids: Vec<Uuid>,
}

/// Request body for link insertion and deletion
#[derive(Debug, Deserialize)]
pub struct LinksRequest {
    pub links: Vec<Link>,
}

/// Request body for `POST /storage/remove`
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub paths: Vec<String>,
}

/// Request body for `POST /storage/sign`
#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub path: String,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub signed_url: String,
}
