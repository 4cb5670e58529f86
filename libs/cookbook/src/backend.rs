//! Data access seams between the editing workflow and the backend
//!
//! Every read and write is scoped by the owning user's id. The HTTP backend
//! relies on the bearer token for scoping, the in-memory backend filters on
//! the id directly.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::CookbookResult,
    image::ImageFile,
    models::{
        Collection, CollectionPatch, CollectionRecipe, Link, NewCollection, NewRecipe, Recipe,
        RecipePatch, RecipeSummary, SlugEntry,
    },
};

#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn recipe_by_slug(&self, owner: Uuid, slug: &str) -> CookbookResult<Recipe>;

    async fn recipe_by_id(&self, owner: Uuid, id: Uuid) -> CookbookResult<Recipe>;

    /// Most recently updated first
    async fn recent_recipes(&self, owner: Uuid, limit: Option<u32>)
    -> CookbookResult<Vec<RecipeSummary>>;

    /// Recipes for the given ids, in no particular order; unknown ids are skipped
    async fn recipes_by_ids(&self, owner: Uuid, ids: &[Uuid]) -> CookbookResult<Vec<RecipeSummary>>;

    /// Every slug of the owner that starts with `prefix` (literal match)
    async fn slugs_with_prefix(&self, owner: Uuid, prefix: &str) -> CookbookResult<Vec<SlugEntry>>;

    async fn insert_recipe(&self, owner: Uuid, recipe: &NewRecipe) -> CookbookResult<Recipe>;

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &RecipePatch,
    ) -> CookbookResult<Recipe>;

    async fn delete_recipe(&self, owner: Uuid, id: Uuid) -> CookbookResult<()>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Newest first
    async fn collections(&self, owner: Uuid) -> CookbookResult<Vec<Collection>>;

    async fn collection(&self, owner: Uuid, id: Uuid) -> CookbookResult<Collection>;

    async fn insert_collection(
        &self,
        owner: Uuid,
        collection: &NewCollection,
    ) -> CookbookResult<Collection>;

    async fn update_collection(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &CollectionPatch,
    ) -> CookbookResult<Collection>;

    async fn delete_collection(&self, owner: Uuid, id: Uuid) -> CookbookResult<()>;
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Join rows of a collection, most recently added first
    async fn links_for_collection(
        &self,
        owner: Uuid,
        collection_id: Uuid,
    ) -> CookbookResult<Vec<CollectionRecipe>>;

    /// Join rows of a recipe, most recently added first
    async fn links_for_recipe(
        &self,
        owner: Uuid,
        recipe_id: Uuid,
    ) -> CookbookResult<Vec<CollectionRecipe>>;

    /// Insert links; links that already exist are left untouched
    async fn insert_links(&self, owner: Uuid, links: &[Link]) -> CookbookResult<()>;

    async fn delete_links(&self, owner: Uuid, links: &[Link]) -> CookbookResult<()>;

    async fn clear_collection_links(&self, owner: Uuid, collection_id: Uuid) -> CookbookResult<()>;

    async fn clear_recipe_links(&self, owner: Uuid, recipe_id: Uuid) -> CookbookResult<()>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload with upsert semantics
    async fn upload_image(&self, path: &str, file: &ImageFile) -> CookbookResult<()>;

    async fn remove_images(&self, paths: &[String]) -> CookbookResult<()>;

    async fn sign_image_url(&self, path: &str, expires_in_seconds: u64) -> CookbookResult<String>;
}

/// Everything the editors need from a backend
pub trait Backend: RecipeStore + CollectionStore + LinkStore + ImageStore {}

impl<T> Backend for T where T: RecipeStore + CollectionStore + LinkStore + ImageStore + ?Sized {}
