//! Access rules for the cover image bucket

use cookbook::image::{ImageKind, owns_path};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Longest signed URL lifetime accepted by S3 presigning (7 days)
pub const MAX_SIGNED_URL_TTL: u64 = 7 * 24 * 60 * 60;

/// Reject paths outside the caller's recipe and collection areas
pub fn authorize_path(owner: Uuid, path: &str) -> ApiResult<()> {
    if owns_path(owner, path) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("Path {} is not writable", path)))
    }
}

/// Accepted image kind for an upload's `Content-Type`
pub fn upload_kind(content_type: Option<&str>) -> ApiResult<ImageKind> {
    let content_type = content_type.unwrap_or_default();
    ImageKind::from_mime(content_type).ok_or_else(|| {
        ApiError::UnsupportedMediaType(format!(
            "Only JPG, PNG, or WEBP allowed (got {})",
            if content_type.is_empty() { "no content type" } else { content_type }
        ))
    })
}

/// Validate a requested signed URL lifetime, falling back to `default`
pub fn signed_url_lifetime(requested: Option<u64>, default: u64) -> ApiResult<u64> {
    match requested.unwrap_or(default) {
        0 => Err(ApiError::BadRequest("expires_in must be positive".to_string())),
        seconds if seconds > MAX_SIGNED_URL_TTL => Err(ApiError::BadRequest(format!(
            "expires_in must be at most {} seconds",
            MAX_SIGNED_URL_TTL
        ))),
        seconds => Ok(seconds),
    }
}

/// How long a signed URL may be served from cache
///
/// Half of the URL lifetime, so a cached URL always has at least half its
/// lifetime left. Short-lived URLs are not cached.
pub fn signed_url_cache_ttl(expires_in: u64) -> Option<u64> {
    if expires_in < 60 {
        None
    } else {
        Some(expires_in / 2)
    }
}

pub fn signed_url_cache_key(path: &str) -> String {
    format!("signed_url:{}", path)
}

/// Cached entry: the lifetime the URL was signed for, then the URL
pub fn encode_cached_url(expires_in: u64, url: &str) -> String {
    format!("{} {}", expires_in, url)
}

/// URL from a cache entry, if it was signed for `expires_in`
pub fn decode_cached_url(entry: &str, expires_in: u64) -> Option<&str> {
    let (lifetime, url) = entry.split_once(' ')?;
    (lifetime.parse::<u64>().ok()? == expires_in).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_authorize_path() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(authorize_path(owner, &format!("recipes/{}/r1/cover.png", owner)).is_ok());
        assert!(authorize_path(owner, &format!("collections/{}/c1/cover.jpg", owner)).is_ok());

        let err = authorize_path(owner, &format!("recipes/{}/r1/cover.png", other)).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(authorize_path(owner, &format!("recipes/{}/../x", owner)).is_err());
        assert!(authorize_path(owner, &format!("avatars/{}/a.png", owner)).is_err());
    }

    #[test]
    fn test_upload_kind() {
        assert_eq!(upload_kind(Some("image/webp")).unwrap(), ImageKind::Webp);

        let err = upload_kind(Some("image/gif")).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.to_string().contains("image/gif"));
        assert!(upload_kind(None).is_err());
    }

    #[test]
    fn test_signed_url_lifetime() {
        assert_eq!(signed_url_lifetime(None, 3600).unwrap(), 3600);
        assert_eq!(signed_url_lifetime(Some(120), 3600).unwrap(), 120);
        assert!(signed_url_lifetime(Some(0), 3600).is_err());
        assert!(signed_url_lifetime(Some(MAX_SIGNED_URL_TTL + 1), 3600).is_err());
    }

    #[test]
    fn test_cache_ttl_is_shorter_than_url_lifetime() {
        assert_eq!(signed_url_cache_ttl(3600), Some(1800));
        assert_eq!(signed_url_cache_ttl(30), None);
        for expires_in in [60, 61, 3600, MAX_SIGNED_URL_TTL] {
            let ttl = signed_url_cache_ttl(expires_in).unwrap();
            assert!(ttl > 0 && ttl < expires_in);
        }
    }

    #[test]
    fn test_cached_url_must_match_lifetime() {
        let entry = encode_cached_url(3600, "https://s3/cover.jpg?X-Amz-Signature=a b");
        assert_eq!(
            decode_cached_url(&entry, 3600),
            Some("https://s3/cover.jpg?X-Amz-Signature=a b")
        );
        assert_eq!(decode_cached_url(&entry, 60), None);
        assert_eq!(decode_cached_url("garbage", 3600), None);
    }
}
