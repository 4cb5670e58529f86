//! Recipe and collection detail editors
//!
//! An editor owns the persisted entity, its draft and the cover edit state.
//! Saving runs in a fixed order: validation, slug assignment (recipes, only
//! when the title changed), core field update, cover upload or removal,
//! image path update and finally a fresh signed URL. The editor leaves edit
//! mode only when every step succeeded.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::Backend,
    draft::{CollectionDraft, RecipeDraft},
    error::{CookbookError, CookbookResult},
    image::{
        CoverChange, CoverOwner, ImageEdit, ImageFile, ImagePlan, Previews, cover_path,
        resolve_signed_url, sync_cover,
    },
    linking::{LinkPlan, MembershipEditor, collection_recipes},
    models::{Collection, CollectionPatch, Recipe, RecipePatch, RecipeSummary},
    session::CurrentUser,
    slug::SlugAssigner,
    view::{Mount, Ticket},
};

/// Record a failure on the view before handing it back
fn surface<T>(last_error: &mut Option<String>, result: CookbookResult<T>) -> CookbookResult<T> {
    match result {
        Ok(value) => {
            *last_error = None;
            Ok(value)
        }
        Err(e) => {
            *last_error = Some(e.to_string());
            Err(e)
        }
    }
}

/// Result of a recipe load, applied with [`RecipeEditor::apply`]
#[derive(Debug)]
pub struct RecipeLoad {
    ticket: Ticket,
    recipe: Recipe,
    image_url: Option<String>,
    collection_ids: Vec<Uuid>,
}

/// Outcome of a successful recipe save
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSaved {
    /// The new slug when the rename changed it
    pub slug_changed: Option<String>,
}

pub struct RecipeEditor<B: Backend + ?Sized> {
    backend: Arc<B>,
    owner: Uuid,
    mount: Mount,
    previews: Previews,
    recipe: Option<Recipe>,
    image_url: Option<String>,
    collection_ids: Vec<Uuid>,
    editing: bool,
    draft: RecipeDraft,
    image: ImageEdit,
    last_error: Option<String>,
}

impl<B: Backend + ?Sized> RecipeEditor<B> {
    pub fn new(backend: Arc<B>, user: &CurrentUser) -> Self {
        Self {
            backend,
            owner: user.id,
            mount: Mount::new(),
            previews: Previews::new(),
            recipe: None,
            image_url: None,
            collection_ids: Vec::new(),
            editing: false,
            draft: RecipeDraft::default(),
            image: ImageEdit::new(None),
            last_error: None,
        }
    }

    /// Create an editor and load the recipe behind `slug`
    pub async fn open(backend: Arc<B>, user: &CurrentUser, slug: &str) -> CookbookResult<Self> {
        let mut editor = Self::new(backend, user);
        editor.load(slug).await?;
        Ok(editor)
    }

    /// Fetch the recipe, its memberships and a display URL
    pub async fn fetch(&self, slug: &str) -> CookbookResult<RecipeLoad> {
        let ticket = self.mount.begin();

        let recipe = self.backend.recipe_by_slug(self.owner, slug).await?;
        let collection_ids = MembershipEditor::new(&*self.backend, self.owner)
            .collections_of(recipe.id)
            .await?;
        let image_url = resolve_signed_url(&*self.backend, recipe.image_path.as_deref()).await;

        Ok(RecipeLoad {
            ticket,
            recipe,
            image_url,
            collection_ids,
        })
    }

    /// Apply a load; returns false when the load is stale or the view is gone
    pub fn apply(&mut self, load: RecipeLoad) -> bool {
        if !self.mount.is_current(load.ticket) {
            debug!("Discarding stale load of recipe {}", load.recipe.slug);
            return false;
        }

        self.draft = RecipeDraft::from_recipe(&load.recipe);
        self.image.reset(load.recipe.image_path.clone());
        self.editing = false;
        self.image_url = load.image_url;
        self.collection_ids = load.collection_ids;
        self.recipe = Some(load.recipe);
        true
    }

    pub async fn load(&mut self, slug: &str) -> CookbookResult<bool> {
        let result = self.fetch(slug).await;
        let load = surface(&mut self.last_error, result)?;
        Ok(self.apply(load))
    }

    pub async fn reload(&mut self) -> CookbookResult<bool> {
        let slug = self.loaded()?.slug.clone();
        self.load(&slug).await
    }

    fn loaded(&self) -> CookbookResult<&Recipe> {
        self.recipe
            .as_ref()
            .ok_or_else(|| CookbookError::NotFound("Recipe".to_string()))
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    /// Signed URL of the persisted cover
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// What the view should show: the staged preview, nothing when the cover
    /// is marked for removal, otherwise the persisted cover
    pub fn display_image_url(&self) -> Option<&str> {
        if let Some(preview) = self.image.preview_url() {
            return Some(preview);
        }
        match self.image.plan() {
            ImagePlan::Remove { .. } => None,
            _ => self.image_url(),
        }
    }

    pub fn collection_ids(&self) -> &[Uuid] {
        &self.collection_ids
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn draft(&self) -> &RecipeDraft {
        &self.draft
    }

    pub fn image(&self) -> &ImageEdit {
        &self.image
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn previews(&self) -> &Previews {
        &self.previews
    }

    /// Snapshot the persisted values into the draft
    pub fn start_edit(&mut self) -> CookbookResult<()> {
        let recipe = self
            .recipe
            .as_ref()
            .ok_or_else(|| CookbookError::NotFound("Recipe".to_string()))?;
        self.draft = RecipeDraft::from_recipe(recipe);
        self.image.reset(recipe.image_path.clone());
        self.editing = true;
        self.last_error = None;
        Ok(())
    }

    /// Restore the draft from the persisted recipe and leave edit mode
    pub fn cancel_edit(&mut self) {
        if let Some(recipe) = &self.recipe {
            self.draft = RecipeDraft::from_recipe(recipe);
            self.image.reset(recipe.image_path.clone());
        }
        self.editing = false;
        self.last_error = None;
    }

    pub fn draft_mut(&mut self) -> CookbookResult<&mut RecipeDraft> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }
        Ok(&mut self.draft)
    }

    /// Stage a new cover; disallowed files are rejected before any request
    pub fn stage_image(&mut self, file: ImageFile) -> CookbookResult<()> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }
        let result = self.image.stage(file, &self.previews);
        surface(&mut self.last_error, result)
    }

    pub fn clear_image(&mut self) -> CookbookResult<()> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }
        self.image.clear();
        Ok(())
    }

    pub async fn save(&mut self) -> CookbookResult<RecipeSaved> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }

        let result = self.persist().await;
        let saved = surface(&mut self.last_error, result)?;

        if let Some(recipe) = &self.recipe {
            self.draft = RecipeDraft::from_recipe(recipe);
            self.image.reset(recipe.image_path.clone());
        }
        self.editing = false;
        Ok(saved)
    }

    async fn persist(&mut self) -> CookbookResult<RecipeSaved> {
        let current = self.loaded()?.clone();
        let title = self.draft.validated_title()?;
        if let Some(file) = self.image.staged_file() {
            file.validate()?;
        }

        let slug = if title != current.title {
            SlugAssigner::new(&*self.backend, self.owner)
                .for_rename(&title, current.id, &current.slug)
                .await?
        } else {
            current.slug.clone()
        };

        let patch = self.draft.to_patch(title, slug.clone());
        let updated = self
            .backend
            .update_recipe(self.owner, current.id, &patch)
            .await?;
        self.recipe = Some(updated);

        let (owner, recipe_id) = (self.owner, current.id);
        let change = sync_cover(&*self.backend, self.image.plan(), |file| {
            cover_path(CoverOwner::Recipe, owner, recipe_id, &file.extension())
        })
        .await?;

        match change {
            CoverChange::Unchanged => {}
            CoverChange::Replaced { path } => {
                let updated = self
                    .backend
                    .update_recipe(owner, recipe_id, &RecipePatch::image_path(Some(path.clone())))
                    .await?;
                self.recipe = Some(updated);
                self.image_url = resolve_signed_url(&*self.backend, Some(&path)).await;
            }
            CoverChange::Removed => {
                let updated = self
                    .backend
                    .update_recipe(owner, recipe_id, &RecipePatch::image_path(None))
                    .await?;
                self.recipe = Some(updated);
                self.image_url = None;
            }
        }

        info!("Saved recipe {} ({})", recipe_id, slug);
        Ok(RecipeSaved {
            slug_changed: (slug != current.slug).then_some(slug),
        })
    }

    /// Make the recipe belong to exactly `desired` collections
    pub async fn set_collections(&mut self, desired: &[Uuid]) -> CookbookResult<LinkPlan> {
        let recipe_id = self.loaded()?.id;
        let membership = MembershipEditor::new(&*self.backend, self.owner);

        let result = async {
            let plan = membership.set_collections_of(recipe_id, desired).await?;
            let ids = membership.collections_of(recipe_id).await?;
            Ok((plan, ids))
        }
        .await;

        let (plan, ids) = surface(&mut self.last_error, result)?;
        self.collection_ids = ids;
        Ok(plan)
    }

    /// Delete the recipe with its cover and memberships, then unmount
    pub async fn delete(&mut self) -> CookbookResult<()> {
        let recipe = self.loaded()?.clone();

        if let Some(path) = &recipe.image_path {
            if let Err(e) = self.backend.remove_images(&[path.clone()]).await {
                warn!("Failed to remove image {}: {}", path, e);
            }
        }

        if let Err(e) = self
            .backend
            .clear_recipe_links(self.owner, recipe.id)
            .await
        {
            warn!("Failed to remove memberships of recipe {}: {}", recipe.id, e);
        }

        let result = self.backend.delete_recipe(self.owner, recipe.id).await;
        surface(&mut self.last_error, result)?;

        info!("Deleted recipe {}", recipe.id);
        self.mount.unmount();
        self.recipe = None;
        self.editing = false;
        self.image.reset(None);
        Ok(())
    }
}

/// Result of a collection load, applied with [`CollectionEditor::apply`]
#[derive(Debug)]
pub struct CollectionLoad {
    ticket: Ticket,
    collection: Collection,
    image_url: Option<String>,
    recipes: Vec<RecipeSummary>,
}

pub struct CollectionEditor<B: Backend + ?Sized> {
    backend: Arc<B>,
    owner: Uuid,
    mount: Mount,
    previews: Previews,
    collection: Option<Collection>,
    image_url: Option<String>,
    recipes: Vec<RecipeSummary>,
    editing: bool,
    draft: CollectionDraft,
    image: ImageEdit,
    last_error: Option<String>,
}

impl<B: Backend + ?Sized> CollectionEditor<B> {
    pub fn new(backend: Arc<B>, user: &CurrentUser) -> Self {
        Self {
            backend,
            owner: user.id,
            mount: Mount::new(),
            previews: Previews::new(),
            collection: None,
            image_url: None,
            recipes: Vec::new(),
            editing: false,
            draft: CollectionDraft::default(),
            image: ImageEdit::new(None),
            last_error: None,
        }
    }

    pub async fn open(backend: Arc<B>, user: &CurrentUser, id: Uuid) -> CookbookResult<Self> {
        let mut editor = Self::new(backend, user);
        editor.load(id).await?;
        Ok(editor)
    }

    /// Fetch the collection, its recipes in join order and a display URL
    pub async fn fetch(&self, id: Uuid) -> CookbookResult<CollectionLoad> {
        let ticket = self.mount.begin();

        let collection = self.backend.collection(self.owner, id).await?;
        let recipes = collection_recipes(&*self.backend, self.owner, id).await?;
        let image_url =
            resolve_signed_url(&*self.backend, collection.image_path.as_deref()).await;

        Ok(CollectionLoad {
            ticket,
            collection,
            image_url,
            recipes,
        })
    }

    pub fn apply(&mut self, load: CollectionLoad) -> bool {
        if !self.mount.is_current(load.ticket) {
            debug!("Discarding stale load of collection {}", load.collection.id);
            return false;
        }

        self.draft = CollectionDraft::from_collection(&load.collection);
        self.image.reset(load.collection.image_path.clone());
        self.editing = false;
        self.image_url = load.image_url;
        self.recipes = load.recipes;
        self.collection = Some(load.collection);
        true
    }

    pub async fn load(&mut self, id: Uuid) -> CookbookResult<bool> {
        let result = self.fetch(id).await;
        let load = surface(&mut self.last_error, result)?;
        Ok(self.apply(load))
    }

    fn loaded(&self) -> CookbookResult<&Collection> {
        self.collection
            .as_ref()
            .ok_or_else(|| CookbookError::NotFound("Collection".to_string()))
    }

    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Recipes in the collection, most recently added first
    pub fn recipes(&self) -> &[RecipeSummary] {
        &self.recipes
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn draft(&self) -> &CollectionDraft {
        &self.draft
    }

    pub fn image(&self) -> &ImageEdit {
        &self.image
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn previews(&self) -> &Previews {
        &self.previews
    }

    pub fn start_edit(&mut self) -> CookbookResult<()> {
        let collection = self
            .collection
            .as_ref()
            .ok_or_else(|| CookbookError::NotFound("Collection".to_string()))?;
        self.draft = CollectionDraft::from_collection(collection);
        self.image.reset(collection.image_path.clone());
        self.editing = true;
        self.last_error = None;
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        if let Some(collection) = &self.collection {
            self.draft = CollectionDraft::from_collection(collection);
            self.image.reset(collection.image_path.clone());
        }
        self.editing = false;
        self.last_error = None;
    }

    pub fn draft_mut(&mut self) -> CookbookResult<&mut CollectionDraft> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }
        Ok(&mut self.draft)
    }

    pub fn stage_image(&mut self, file: ImageFile) -> CookbookResult<()> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }
        let result = self.image.stage(file, &self.previews);
        surface(&mut self.last_error, result)
    }

    pub fn clear_image(&mut self) -> CookbookResult<()> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }
        self.image.clear();
        Ok(())
    }

    pub async fn save(&mut self) -> CookbookResult<()> {
        if !self.editing {
            return Err(CookbookError::NotEditing);
        }

        let result = self.persist().await;
        surface(&mut self.last_error, result)?;

        if let Some(collection) = &self.collection {
            self.draft = CollectionDraft::from_collection(collection);
            self.image.reset(collection.image_path.clone());
        }
        self.editing = false;
        Ok(())
    }

    async fn persist(&mut self) -> CookbookResult<()> {
        let collection_id = self.loaded()?.id;
        let name = self.draft.validated_name()?;
        if let Some(file) = self.image.staged_file() {
            file.validate()?;
        }

        let updated = self
            .backend
            .update_collection(self.owner, collection_id, &self.draft.to_patch(name))
            .await?;
        self.collection = Some(updated);

        let owner = self.owner;
        let change = sync_cover(&*self.backend, self.image.plan(), |file| {
            cover_path(CoverOwner::Collection, owner, collection_id, &file.extension())
        })
        .await?;

        let patch = match &change {
            CoverChange::Unchanged => None,
            CoverChange::Replaced { path } => Some(CollectionPatch::image_path(Some(path.clone()))),
            CoverChange::Removed => Some(CollectionPatch::image_path(None)),
        };

        if let Some(patch) = patch {
            let updated = self
                .backend
                .update_collection(owner, collection_id, &patch)
                .await?;
            self.image_url =
                resolve_signed_url(&*self.backend, updated.image_path.as_deref()).await;
            self.collection = Some(updated);
        }

        info!("Saved collection {}", collection_id);
        Ok(())
    }

    pub async fn add_recipe(&mut self, recipe_id: Uuid) -> CookbookResult<LinkPlan> {
        let mut desired: Vec<Uuid> = self.recipes.iter().map(|r| r.id).collect();
        desired.push(recipe_id);
        self.set_recipes(&desired).await
    }

    pub async fn remove_recipe(&mut self, recipe_id: Uuid) -> CookbookResult<LinkPlan> {
        let desired: Vec<Uuid> = self
            .recipes
            .iter()
            .map(|r| r.id)
            .filter(|id| *id != recipe_id)
            .collect();
        self.set_recipes(&desired).await
    }

    /// Make the collection contain exactly `desired` recipes
    pub async fn set_recipes(&mut self, desired: &[Uuid]) -> CookbookResult<LinkPlan> {
        let collection_id = self.loaded()?.id;
        let owner = self.owner;
        let backend = Arc::clone(&self.backend);

        let result = async {
            let plan = MembershipEditor::new(&*backend, owner)
                .set_recipes_of(collection_id, desired)
                .await?;
            let recipes = collection_recipes(&*backend, owner, collection_id).await?;
            Ok((plan, recipes))
        }
        .await;

        let (plan, recipes) = surface(&mut self.last_error, result)?;
        self.recipes = recipes;
        Ok(plan)
    }

    /// Delete the collection with its cover and join rows, then unmount
    ///
    /// Recipes in the collection are not touched.
    pub async fn delete(&mut self) -> CookbookResult<()> {
        let collection = self.loaded()?.clone();

        if let Some(path) = &collection.image_path {
            if let Err(e) = self.backend.remove_images(&[path.clone()]).await {
                warn!("Failed to remove image {}: {}", path, e);
            }
        }

        if let Err(e) = self
            .backend
            .clear_collection_links(self.owner, collection.id)
            .await
        {
            warn!("Failed to remove join rows of collection {}: {}", collection.id, e);
        }

        let result = self
            .backend
            .delete_collection(self.owner, collection.id)
            .await;
        surface(&mut self.last_error, result)?;

        info!("Deleted collection {}", collection.id);
        self.mount.unmount();
        self.collection = None;
        self.recipes.clear();
        self.editing = false;
        self.image.reset(None);
        Ok(())
    }
}
