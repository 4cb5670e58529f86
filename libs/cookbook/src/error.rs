//! Error types surfaced by the client core

use thiserror::Error;

/// Errors raised while loading, editing or persisting recipes and collections
#[derive(Error, Debug)]
pub enum CookbookError {
    /// A required field is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Only JPEG, PNG and WEBP covers are accepted
    #[error("Only JPG, PNG, or WEBP allowed (got {0})")]
    UnsupportedImageType(String),

    #[error("Image is {size} bytes, the limit is {limit} bytes")]
    ImageTooLarge { size: usize, limit: usize },

    #[error("{0} not found")]
    NotFound(String),

    /// The write collided with an existing row (duplicate slug)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Already signed in")]
    AlreadySignedIn,

    /// An edit operation was attempted outside edit mode
    #[error("Not in edit mode")]
    NotEditing,

    #[error("Unauthorized")]
    Unauthorized,

    /// The backend reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transport failure talking to the services
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Type alias for Result with CookbookError
pub type CookbookResult<T> = Result<T, CookbookError>;
