//! Creation forms for recipes and collections
//!
//! A form keeps the entity it inserted until the cover step has finished.
//! Submitting again after a failed cover upload writes any draft edits made
//! since the insert to that entity and retries the cover, instead of
//! inserting a duplicate. A fully successful submit resets the form.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    backend::Backend,
    draft::{CollectionDraft, RecipeDraft},
    error::CookbookResult,
    image::{CoverOwner, ImageFile, PreviewHandle, Previews, cover_path},
    models::{Collection, CollectionPatch, Recipe, RecipePatch},
    session::CurrentUser,
    slug::SlugAssigner,
};

/// Optional cover picked on a creation form
#[derive(Debug, Default)]
struct CoverPick {
    file: Option<(ImageFile, PreviewHandle)>,
}

impl CoverPick {
    fn pick(&mut self, file: ImageFile, previews: &Previews) -> CookbookResult<()> {
        file.validate()?;
        let preview = previews.create(&file);
        self.file = Some((file, preview));
        Ok(())
    }

    fn file(&self) -> Option<&ImageFile> {
        self.file.as_ref().map(|(file, _)| file)
    }

    fn preview_url(&self) -> Option<&str> {
        self.file.as_ref().map(|(_, preview)| preview.url())
    }
}

/// Upload the cover of a freshly created entity and return its path
async fn upload_cover<B: Backend + ?Sized>(
    backend: &B,
    file: &ImageFile,
    owner: CoverOwner,
    user_id: Uuid,
    entity_id: Uuid,
) -> CookbookResult<String> {
    let path = cover_path(owner, user_id, entity_id, &file.extension());
    backend.upload_image(&path, file).await?;
    Ok(path)
}

pub struct NewRecipeForm<B: Backend + ?Sized> {
    backend: Arc<B>,
    owner: Uuid,
    previews: Previews,
    pub draft: RecipeDraft,
    cover: CoverPick,
    created: Option<Recipe>,
    last_error: Option<String>,
}

impl<B: Backend + ?Sized> NewRecipeForm<B> {
    pub fn new(backend: Arc<B>, user: &CurrentUser) -> Self {
        Self {
            backend,
            owner: user.id,
            previews: Previews::new(),
            draft: RecipeDraft::default(),
            cover: CoverPick::default(),
            created: None,
            last_error: None,
        }
    }

    /// Pick a cover; disallowed files are rejected before any request
    pub fn pick_image(&mut self, file: ImageFile) -> CookbookResult<()> {
        let result = self.cover.pick(file, &self.previews);
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }

    pub fn clear_image(&mut self) {
        self.cover.file = None;
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.cover.preview_url()
    }

    pub fn previews(&self) -> &Previews {
        &self.previews
    }

    /// Recipe inserted by a submit whose cover step has not finished
    pub fn created(&self) -> Option<&Recipe> {
        self.created.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Create the recipe with a unique slug, then attach the cover
    pub async fn submit(&mut self) -> CookbookResult<Recipe> {
        match self.create().await {
            Ok(recipe) => {
                self.last_error = None;
                self.cover.file = None;
                self.created = None;
                self.draft = RecipeDraft::default();
                Ok(recipe)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn create(&mut self) -> CookbookResult<Recipe> {
        let title = self.draft.validated_title()?;
        if let Some(file) = self.cover.file() {
            file.validate()?;
        }

        let recipe = match self.created.clone() {
            Some(recipe) => self.update_created(recipe, title).await?,
            None => {
                let slug = SlugAssigner::new(&*self.backend, self.owner)
                    .for_new(&title)
                    .await?;
                let recipe = self
                    .backend
                    .insert_recipe(self.owner, &self.draft.to_new(title, slug))
                    .await?;
                info!("Created recipe {} ({})", recipe.id, recipe.slug);
                self.created = Some(recipe.clone());
                recipe
            }
        };

        let Some(file) = self.cover.file() else {
            return Ok(recipe);
        };

        let path = upload_cover(&*self.backend, file, CoverOwner::Recipe, self.owner, recipe.id)
            .await?;
        let recipe = self
            .backend
            .update_recipe(self.owner, recipe.id, &RecipePatch::image_path(Some(path)))
            .await?;
        self.created = Some(recipe.clone());
        Ok(recipe)
    }

    /// Write draft edits made since the insert to the created recipe
    async fn update_created(&mut self, recipe: Recipe, title: String) -> CookbookResult<Recipe> {
        let unchanged = RecipeDraft {
            title: title.clone(),
            ..self.draft.clone()
        } == RecipeDraft::from_recipe(&recipe);
        if unchanged {
            return Ok(recipe);
        }

        let slug = if title != recipe.title {
            SlugAssigner::new(&*self.backend, self.owner)
                .for_rename(&title, recipe.id, &recipe.slug)
                .await?
        } else {
            recipe.slug.clone()
        };

        let updated = self
            .backend
            .update_recipe(self.owner, recipe.id, &self.draft.to_patch(title, slug))
            .await?;
        self.created = Some(updated.clone());
        Ok(updated)
    }
}

pub struct NewCollectionForm<B: Backend + ?Sized> {
    backend: Arc<B>,
    owner: Uuid,
    previews: Previews,
    pub draft: CollectionDraft,
    cover: CoverPick,
    created: Option<Collection>,
    last_error: Option<String>,
}

impl<B: Backend + ?Sized> NewCollectionForm<B> {
    pub fn new(backend: Arc<B>, user: &CurrentUser) -> Self {
        Self {
            backend,
            owner: user.id,
            previews: Previews::new(),
            draft: CollectionDraft::default(),
            cover: CoverPick::default(),
            created: None,
            last_error: None,
        }
    }

    pub fn pick_image(&mut self, file: ImageFile) -> CookbookResult<()> {
        let result = self.cover.pick(file, &self.previews);
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }

    pub fn clear_image(&mut self) {
        self.cover.file = None;
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.cover.preview_url()
    }

    pub fn previews(&self) -> &Previews {
        &self.previews
    }

    /// Collection inserted by a submit whose cover step has not finished
    pub fn created(&self) -> Option<&Collection> {
        self.created.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn submit(&mut self) -> CookbookResult<Collection> {
        match self.create().await {
            Ok(collection) => {
                self.last_error = None;
                self.cover.file = None;
                self.created = None;
                self.draft = CollectionDraft::default();
                Ok(collection)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn create(&mut self) -> CookbookResult<Collection> {
        let name = self.draft.validated_name()?;
        if let Some(file) = self.cover.file() {
            file.validate()?;
        }

        let collection = match self.created.clone() {
            Some(collection) => self.update_created(collection, name).await?,
            None => {
                let collection = self
                    .backend
                    .insert_collection(self.owner, &self.draft.to_new(name))
                    .await?;
                info!("Created collection {}", collection.id);
                self.created = Some(collection.clone());
                collection
            }
        };

        let Some(file) = self.cover.file() else {
            return Ok(collection);
        };

        let path = upload_cover(
            &*self.backend,
            file,
            CoverOwner::Collection,
            self.owner,
            collection.id,
        )
        .await?;
        let collection = self
            .backend
            .update_collection(
                self.owner,
                collection.id,
                &CollectionPatch::image_path(Some(path)),
            )
            .await?;
        self.created = Some(collection.clone());
        Ok(collection)
    }

    async fn update_created(
        &mut self,
        collection: Collection,
        name: String,
    ) -> CookbookResult<Collection> {
        let unchanged = CollectionDraft {
            name: name.clone(),
            description: self.draft.description.trim().to_string(),
        } == CollectionDraft::from_collection(&collection);
        if unchanged {
            return Ok(collection);
        }

        let updated = self
            .backend
            .update_collection(self.owner, collection.id, &self.draft.to_patch(name))
            .await?;
        self.created = Some(updated.clone());
        Ok(updated)
    }
}
