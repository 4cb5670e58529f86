//! Cover image lifecycle
//!
//! Covers live in the `recipe-images` bucket at a deterministic path per
//! entity. While editing, a cover is in one of four states: none, the
//! persisted one, a staged replacement being previewed, or marked for
//! removal. Saving turns the state into an [`ImagePlan`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    backend::ImageStore,
    error::{CookbookError, CookbookResult},
};

/// Bucket holding every cover image
pub const IMAGE_BUCKET: &str = "recipe-images";

/// Lifetime of a signed display URL (1 hour)
pub const SIGNED_URL_TTL_SECONDS: u64 = 60 * 60;

/// Largest accepted cover (10 MiB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Accepted cover formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }
}

/// File extension for an upload: MIME first, then the file name, then `jpg`
pub fn extension_for(content_type: &str, file_name: &str) -> String {
    if let Some(kind) = ImageKind::from_mime(content_type) {
        return kind.extension().to_string();
    }

    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "jpg".to_string())
}

/// A file picked by the user
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Check type and size without touching the network
    pub fn validate(&self) -> CookbookResult<ImageKind> {
        let kind = ImageKind::from_mime(&self.content_type)
            .ok_or_else(|| CookbookError::UnsupportedImageType(self.content_type.clone()))?;

        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(CookbookError::ImageTooLarge {
                size: self.bytes.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }

        Ok(kind)
    }

    pub fn extension(&self) -> String {
        extension_for(&self.content_type, &self.file_name)
    }
}

/// Which kind of entity a cover belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOwner {
    Recipe,
    Collection,
}

impl CoverOwner {
    pub fn prefix(&self) -> &'static str {
        match self {
            CoverOwner::Recipe => "recipes",
            CoverOwner::Collection => "collections",
        }
    }
}

/// Deterministic storage path of an entity's cover
pub fn cover_path(owner: CoverOwner, user_id: Uuid, entity_id: Uuid, extension: &str) -> String {
    format!(
        "{}/{}/{}/cover.{}",
        owner.prefix(),
        user_id,
        entity_id,
        extension
    )
}

/// True when `path` lies inside `user_id`'s recipe or collection area
pub fn owns_path(user_id: Uuid, path: &str) -> bool {
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return false;
    }

    let mut segments = path.splitn(3, '/');
    let area = segments.next();
    let owner = segments.next();
    let rest = segments.next();

    matches!(area, Some("recipes") | Some("collections"))
        && owner == Some(user_id.to_string().as_str())
        && rest.is_some_and(|r| !r.is_empty())
}

#[derive(Debug, Default)]
struct PreviewRegistry {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

/// Tracks local preview references handed out to the view
#[derive(Debug, Clone, Default)]
pub struct Previews {
    registry: Arc<PreviewRegistry>,
}

impl Previews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview reference for a staged file
    pub fn create(&self, file: &ImageFile) -> PreviewHandle {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut live) = self.registry.live.lock() {
            live.insert(id);
        }

        PreviewHandle {
            id,
            url: format!("preview://{}/{}", id, file.file_name),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Number of previews not yet revoked
    pub fn live_count(&self) -> usize {
        self.registry.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

/// A local preview reference; revoked when dropped
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    url: String,
    registry: Arc<PreviewRegistry>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Ok(mut live) = self.registry.live.lock() {
            live.remove(&self.id);
        }
    }
}

/// Edit state of a cover
#[derive(Debug)]
pub enum ImageState {
    None,
    Existing(String),
    PreviewingNew {
        file: ImageFile,
        preview: PreviewHandle,
    },
    MarkedForRemoval(String),
}

/// What saving should do with the cover
#[derive(Debug, PartialEq)]
pub enum ImagePlan<'a> {
    Keep,
    Replace {
        file: &'a ImageFile,
        previous: Option<&'a str>,
    },
    Remove {
        path: &'a str,
    },
}

/// Cover edit state bound to the persisted path
#[derive(Debug)]
pub struct ImageEdit {
    persisted: Option<String>,
    state: ImageState,
}

impl ImageEdit {
    pub fn new(persisted: Option<String>) -> Self {
        let state = match &persisted {
            Some(path) => ImageState::Existing(path.clone()),
            None => ImageState::None,
        };
        Self { persisted, state }
    }

    /// Forget any staged change; a staged preview is revoked
    pub fn reset(&mut self, persisted: Option<String>) {
        *self = Self::new(persisted);
    }

    pub fn state(&self) -> &ImageState {
        &self.state
    }

    pub fn persisted(&self) -> Option<&str> {
        self.persisted.as_deref()
    }

    /// Stage a replacement; rejects disallowed files before anything else happens
    pub fn stage(&mut self, file: ImageFile, previews: &Previews) -> CookbookResult<()> {
        file.validate()?;

        let preview = previews.create(&file);
        debug!("Staged cover {} as {}", file.file_name, preview.url());
        self.state = ImageState::PreviewingNew { file, preview };
        Ok(())
    }

    /// Drop the staged file or mark the persisted cover for removal
    pub fn clear(&mut self) {
        self.state = match &self.persisted {
            Some(path) => ImageState::MarkedForRemoval(path.clone()),
            None => ImageState::None,
        };
    }

    pub fn preview_url(&self) -> Option<&str> {
        match &self.state {
            ImageState::PreviewingNew { preview, .. } => Some(preview.url()),
            _ => None,
        }
    }

    pub fn staged_file(&self) -> Option<&ImageFile> {
        match &self.state {
            ImageState::PreviewingNew { file, .. } => Some(file),
            _ => None,
        }
    }

    pub fn plan(&self) -> ImagePlan<'_> {
        match &self.state {
            ImageState::PreviewingNew { file, .. } => ImagePlan::Replace {
                file,
                previous: self.persisted.as_deref(),
            },
            ImageState::MarkedForRemoval(path) => ImagePlan::Remove { path },
            ImageState::None | ImageState::Existing(_) => ImagePlan::Keep,
        }
    }
}

/// Outcome of applying an [`ImagePlan`] to storage
#[derive(Debug, Clone, PartialEq)]
pub enum CoverChange {
    Unchanged,
    Replaced { path: String },
    Removed,
}

/// Apply a plan to storage; the caller persists the resulting path
///
/// Failing to delete a superseded or removed object is logged only: the row
/// is the source of truth and the orphan sweeper reclaims the object.
pub async fn sync_cover<S: ImageStore + ?Sized>(
    store: &S,
    plan: ImagePlan<'_>,
    target_path: impl FnOnce(&ImageFile) -> String,
) -> CookbookResult<CoverChange> {
    match plan {
        ImagePlan::Keep => Ok(CoverChange::Unchanged),
        ImagePlan::Replace { file, previous } => {
            file.validate()?;
            let path = target_path(file);
            store.upload_image(&path, file).await?;

            if let Some(previous) = previous.filter(|p| *p != path) {
                if let Err(e) = store.remove_images(&[previous.to_string()]).await {
                    warn!("Failed to remove old image {}: {}", previous, e);
                }
            }

            Ok(CoverChange::Replaced { path })
        }
        ImagePlan::Remove { path } => {
            if let Err(e) = store.remove_images(&[path.to_string()]).await {
                warn!("Failed to remove image {} from storage: {}", path, e);
            }
            Ok(CoverChange::Removed)
        }
    }
}

/// Resolve a display URL for a stored path
///
/// Signing failures are logged and yield `None`; the view falls back to its
/// "no photo" state.
pub async fn resolve_signed_url<S: ImageStore + ?Sized>(
    store: &S,
    path: Option<&str>,
) -> Option<String> {
    let path = path?;

    match store.sign_image_url(path, SIGNED_URL_TTL_SECONDS).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Failed to create signed URL for {}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> ImageFile {
        ImageFile::new("cover.png", "image/png", vec![1, 2, 3])
    }

    #[test]
    fn test_extension_prefers_mime() {
        assert_eq!(extension_for("image/jpeg", "photo.jpeg"), "jpg");
        assert_eq!(extension_for("IMAGE/WEBP", "photo"), "webp");
        assert_eq!(extension_for("application/octet-stream", "Photo.PNG"), "png");
        assert_eq!(extension_for("", "no-extension"), "jpg");
    }

    #[test]
    fn test_validate_rejects_disallowed_types_and_sizes() {
        let gif = ImageFile::new("anim.gif", "image/gif", vec![0]);
        assert!(matches!(gif.validate(), Err(CookbookError::UnsupportedImageType(t)) if t == "image/gif"));

        let huge = ImageFile::new("big.jpg", "image/jpeg", vec![0; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(huge.validate(), Err(CookbookError::ImageTooLarge { .. })));

        assert_eq!(png().validate().unwrap(), ImageKind::Png);
    }

    #[test]
    fn test_cover_path_and_ownership() {
        let user = Uuid::new_v4();
        let recipe = Uuid::new_v4();
        let path = cover_path(CoverOwner::Recipe, user, recipe, "png");

        assert_eq!(path, format!("recipes/{}/{}/cover.png", user, recipe));
        assert!(owns_path(user, &path));
        assert!(!owns_path(Uuid::new_v4(), &path));
        assert!(!owns_path(user, &format!("avatars/{}/x.png", user)));
        assert!(!owns_path(user, &format!("recipes/{}/../other/cover.png", user)));
        assert!(!owns_path(user, &format!("recipes/{}", user)));
    }

    #[test]
    fn test_state_transitions() {
        let previews = Previews::new();
        let mut edit = ImageEdit::new(Some("recipes/u/r/cover.jpg".to_string()));
        assert_eq!(edit.plan(), ImagePlan::Keep);

        edit.stage(png(), &previews).unwrap();
        assert!(matches!(edit.plan(), ImagePlan::Replace { previous: Some(_), .. }));
        assert!(edit.preview_url().is_some());

        edit.clear();
        assert_eq!(edit.plan(), ImagePlan::Remove { path: "recipes/u/r/cover.jpg" });
        assert_eq!(previews.live_count(), 0);

        let mut fresh = ImageEdit::new(None);
        fresh.clear();
        assert_eq!(fresh.plan(), ImagePlan::Keep);
    }

    #[test]
    fn test_superseded_preview_is_revoked() {
        let previews = Previews::new();
        let mut edit = ImageEdit::new(None);

        edit.stage(png(), &previews).unwrap();
        let first = edit.preview_url().unwrap().to_string();
        edit.stage(ImageFile::new("b.webp", "image/webp", vec![9]), &previews)
            .unwrap();

        assert_eq!(previews.live_count(), 1);
        assert_ne!(edit.preview_url().unwrap(), first);

        edit.reset(None);
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn test_rejected_stage_keeps_current_state() {
        let previews = Previews::new();
        let mut edit = ImageEdit::new(Some("collections/u/c/cover.png".to_string()));

        let result = edit.stage(ImageFile::new("x.bmp", "image/bmp", vec![]), &previews);
        assert!(result.is_err());
        assert!(matches!(edit.state(), ImageState::Existing(_)));
        assert_eq!(previews.live_count(), 0);
    }
}
