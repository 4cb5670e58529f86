//! In-memory backend
//!
//! Behaves like the API service (owner scoping, unique slugs, idempotent link
//! inserts, upserting uploads) and records every call so callers can check
//! which operations reached the backend. Failures can be injected per
//! operation name.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{
    backend::{CollectionStore, ImageStore, LinkStore, RecipeStore},
    error::{CookbookError, CookbookResult},
    image::{IMAGE_BUCKET, ImageFile, ImageKind},
    models::{
        Collection, CollectionPatch, CollectionRecipe, Link, NewCollection, NewRecipe, Recipe,
        RecipePatch, RecipeSummary, SlugEntry,
    },
    session::{AuthBackend, CurrentUser, Session},
};

/// Object held by the in-memory storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    recipes: Vec<Recipe>,
    collections: Vec<Collection>,
    links: Vec<CollectionRecipe>,
    objects: HashMap<String, StoredImage>,
    calls: Vec<String>,
    failures: HashSet<String>,
    last_timestamp: Option<DateTime<Utc>>,
    signed: u64,
}

impl State {
    /// Record a call, failing it if a failure was injected
    fn call(&mut self, op: &str) -> CookbookResult<()> {
        self.calls.push(op.to_string());
        if self.failures.remove(op) {
            return Err(CookbookError::Backend(format!("injected failure in {}", op)));
        }
        Ok(())
    }

    /// Strictly increasing timestamps keep orderings deterministic
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn recipe_mut(&mut self, owner: Uuid, id: Uuid) -> CookbookResult<&mut Recipe> {
        self.recipes
            .iter_mut()
            .find(|r| r.user_id == owner && r.id == id)
            .ok_or_else(|| CookbookError::NotFound("Recipe".to_string()))
    }

    fn collection_mut(&mut self, owner: Uuid, id: Uuid) -> CookbookResult<&mut Collection> {
        self.collections
            .iter_mut()
            .find(|c| c.user_id == owner && c.id == id)
            .ok_or_else(|| CookbookError::NotFound("Collection".to_string()))
    }

    fn slug_taken(&self, owner: Uuid, slug: &str, except: Option<Uuid>) -> bool {
        self.recipes
            .iter()
            .any(|r| r.user_id == owner && r.slug == slug && Some(r.id) != except)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Operation names called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the next call of `op` fail
    pub fn fail_next(&self, op: &str) {
        self.lock().failures.insert(op.to_string());
    }

    pub fn object(&self, path: &str) -> Option<StoredImage> {
        self.lock().objects.get(path).cloned()
    }

    pub fn object_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Every join row, in insertion order
    pub fn link_rows(&self) -> Vec<CollectionRecipe> {
        self.lock().links.clone()
    }

    /// Store an object directly, bypassing the call log
    pub fn put_object(&self, path: &str, content_type: &str, bytes: Vec<u8>) {
        self.lock().objects.insert(
            path.to_string(),
            StoredImage {
                content_type: content_type.to_string(),
                bytes,
            },
        );
    }
}

fn summaries<'a>(recipes: impl Iterator<Item = &'a Recipe>) -> Vec<RecipeSummary> {
    recipes.map(RecipeSummary::from).collect()
}

#[async_trait]
impl RecipeStore for MemoryBackend {
    async fn recipe_by_slug(&self, owner: Uuid, slug: &str) -> CookbookResult<Recipe> {
        let mut state = self.lock();
        state.call("recipe_by_slug")?;
        state
            .recipes
            .iter()
            .find(|r| r.user_id == owner && r.slug == slug)
            .cloned()
            .ok_or_else(|| CookbookError::NotFound("Recipe".to_string()))
    }

    async fn recipe_by_id(&self, owner: Uuid, id: Uuid) -> CookbookResult<Recipe> {
        let mut state = self.lock();
        state.call("recipe_by_id")?;
        state.recipe_mut(owner, id).map(|r| r.clone())
    }

    async fn recent_recipes(
        &self,
        owner: Uuid,
        limit: Option<u32>,
    ) -> CookbookResult<Vec<RecipeSummary>> {
        let mut state = self.lock();
        state.call("recent_recipes")?;

        let mut owned: Vec<&Recipe> = state.recipes.iter().filter(|r| r.user_id == owner).collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = limit {
            owned.truncate(limit as usize);
        }
        Ok(summaries(owned.into_iter()))
    }

    async fn recipes_by_ids(
        &self,
        owner: Uuid,
        ids: &[Uuid],
    ) -> CookbookResult<Vec<RecipeSummary>> {
        let mut state = self.lock();
        state.call("recipes_by_ids")?;
        Ok(summaries(
            state
                .recipes
                .iter()
                .filter(|r| r.user_id == owner && ids.contains(&r.id)),
        ))
    }

    async fn slugs_with_prefix(&self, owner: Uuid, prefix: &str) -> CookbookResult<Vec<SlugEntry>> {
        let mut state = self.lock();
        state.call("slugs_with_prefix")?;
        Ok(state
            .recipes
            .iter()
            .filter(|r| r.user_id == owner && r.slug.starts_with(prefix))
            .map(|r| SlugEntry {
                id: r.id,
                slug: r.slug.clone(),
            })
            .collect())
    }

    async fn insert_recipe(&self, owner: Uuid, recipe: &NewRecipe) -> CookbookResult<Recipe> {
        let mut state = self.lock();
        state.call("insert_recipe")?;

        if state.slug_taken(owner, &recipe.slug, None) {
            return Err(CookbookError::Conflict(format!(
                "slug {} already exists",
                recipe.slug
            )));
        }

        let now = state.now();
        let created = Recipe {
            id: Uuid::new_v4(),
            user_id: owner,
            title: recipe.title.clone(),
            slug: recipe.slug.clone(),
            ingredients: recipe.ingredients.clone(),
            steps: recipe.steps.clone(),
            notes: recipe.notes.clone(),
            tags: recipe.tags.clone(),
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        state.recipes.push(created.clone());
        Ok(created)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &RecipePatch,
    ) -> CookbookResult<Recipe> {
        let mut state = self.lock();
        state.call("update_recipe")?;

        if let Some(slug) = &patch.slug {
            if state.slug_taken(owner, slug, Some(id)) {
                return Err(CookbookError::Conflict(format!("slug {} already exists", slug)));
            }
        }

        let now = state.now();
        let recipe = state.recipe_mut(owner, id)?;
        patch.apply_to(recipe);
        recipe.updated_at = now;
        Ok(recipe.clone())
    }

    async fn delete_recipe(&self, owner: Uuid, id: Uuid) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("delete_recipe")?;
        state.recipe_mut(owner, id)?;

        state.recipes.retain(|r| !(r.user_id == owner && r.id == id));
        state
            .links
            .retain(|l| !(l.user_id == owner && l.recipe_id == id));
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for MemoryBackend {
    async fn collections(&self, owner: Uuid) -> CookbookResult<Vec<Collection>> {
        let mut state = self.lock();
        state.call("collections")?;

        let mut owned: Vec<Collection> = state
            .collections
            .iter()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn collection(&self, owner: Uuid, id: Uuid) -> CookbookResult<Collection> {
        let mut state = self.lock();
        state.call("collection")?;
        state.collection_mut(owner, id).map(|c| c.clone())
    }

    async fn insert_collection(
        &self,
        owner: Uuid,
        collection: &NewCollection,
    ) -> CookbookResult<Collection> {
        let mut state = self.lock();
        state.call("insert_collection")?;

        let now = state.now();
        let created = Collection {
            id: Uuid::new_v4(),
            user_id: owner,
            name: collection.name.clone(),
            description: collection.description.clone(),
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        state.collections.push(created.clone());
        Ok(created)
    }

    async fn update_collection(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &CollectionPatch,
    ) -> CookbookResult<Collection> {
        let mut state = self.lock();
        state.call("update_collection")?;

        let now = state.now();
        let collection = state.collection_mut(owner, id)?;
        patch.apply_to(collection);
        collection.updated_at = now;
        Ok(collection.clone())
    }

    async fn delete_collection(&self, owner: Uuid, id: Uuid) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("delete_collection")?;
        state.collection_mut(owner, id)?;

        state
            .collections
            .retain(|c| !(c.user_id == owner && c.id == id));
        state
            .links
            .retain(|l| !(l.user_id == owner && l.collection_id == id));
        Ok(())
    }
}

#[async_trait]
impl LinkStore for MemoryBackend {
    async fn links_for_collection(
        &self,
        owner: Uuid,
        collection_id: Uuid,
    ) -> CookbookResult<Vec<CollectionRecipe>> {
        let mut state = self.lock();
        state.call("links_for_collection")?;

        let mut rows: Vec<CollectionRecipe> = state
            .links
            .iter()
            .filter(|l| l.user_id == owner && l.collection_id == collection_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(rows)
    }

    async fn links_for_recipe(
        &self,
        owner: Uuid,
        recipe_id: Uuid,
    ) -> CookbookResult<Vec<CollectionRecipe>> {
        let mut state = self.lock();
        state.call("links_for_recipe")?;

        let mut rows: Vec<CollectionRecipe> = state
            .links
            .iter()
            .filter(|l| l.user_id == owner && l.recipe_id == recipe_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(rows)
    }

    async fn insert_links(&self, owner: Uuid, links: &[Link]) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("insert_links")?;

        for link in links {
            let exists = state.links.iter().any(|l| {
                l.user_id == owner
                    && l.collection_id == link.collection_id
                    && l.recipe_id == link.recipe_id
            });
            if exists {
                continue;
            }

            let known = state
                .collections
                .iter()
                .any(|c| c.user_id == owner && c.id == link.collection_id)
                && state
                    .recipes
                    .iter()
                    .any(|r| r.user_id == owner && r.id == link.recipe_id);
            if !known {
                return Err(CookbookError::NotFound("Collection or recipe".to_string()));
            }

            let added_at = state.now();
            state.links.push(CollectionRecipe {
                user_id: owner,
                collection_id: link.collection_id,
                recipe_id: link.recipe_id,
                added_at,
            });
        }
        Ok(())
    }

    async fn delete_links(&self, owner: Uuid, links: &[Link]) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("delete_links")?;
        state.links.retain(|l| {
            !(l.user_id == owner
                && links
                    .iter()
                    .any(|k| k.collection_id == l.collection_id && k.recipe_id == l.recipe_id))
        });
        Ok(())
    }

    async fn clear_collection_links(&self, owner: Uuid, collection_id: Uuid) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("clear_collection_links")?;
        state
            .links
            .retain(|l| !(l.user_id == owner && l.collection_id == collection_id));
        Ok(())
    }

    async fn clear_recipe_links(&self, owner: Uuid, recipe_id: Uuid) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("clear_recipe_links")?;
        state
            .links
            .retain(|l| !(l.user_id == owner && l.recipe_id == recipe_id));
        Ok(())
    }
}

#[async_trait]
impl ImageStore for MemoryBackend {
    async fn upload_image(&self, path: &str, file: &ImageFile) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("upload_image")?;

        if ImageKind::from_mime(&file.content_type).is_none() {
            return Err(CookbookError::UnsupportedImageType(file.content_type.clone()));
        }

        state.objects.insert(
            path.to_string(),
            StoredImage {
                content_type: file.content_type.clone(),
                bytes: file.bytes.clone(),
            },
        );
        Ok(())
    }

    async fn remove_images(&self, paths: &[String]) -> CookbookResult<()> {
        let mut state = self.lock();
        state.call("remove_images")?;
        for path in paths {
            state.objects.remove(path);
        }
        Ok(())
    }

    async fn sign_image_url(&self, path: &str, expires_in_seconds: u64) -> CookbookResult<String> {
        let mut state = self.lock();
        state.call("sign_image_url")?;

        if !state.objects.contains_key(path) {
            return Err(CookbookError::NotFound("Object".to_string()));
        }

        state.signed += 1;
        Ok(format!(
            "memory://{}/{}?expires_in={}&token={}",
            IMAGE_BUCKET, path, expires_in_seconds, state.signed
        ))
    }
}

#[derive(Debug, Clone)]
struct Account {
    user: CurrentUser,
    password: String,
}

/// In-memory auth service issuing opaque tokens
#[derive(Debug, Default)]
pub struct MemoryAuth {
    accounts: Mutex<Vec<Account>>,
    refresh_tokens: Mutex<HashMap<String, Uuid>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&self, user: &CurrentUser) -> Session {
        let refresh_token = Uuid::new_v4().to_string();
        if let Ok(mut tokens) = self.refresh_tokens.lock() {
            tokens.insert(refresh_token.clone(), user.id);
        }

        Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: 900,
            user: user.clone(),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, Vec<Account>> {
        self.accounts.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    async fn sign_up(&self, email: &str, password: &str) -> CookbookResult<CurrentUser> {
        let mut accounts = self.accounts();
        if accounts.iter().any(|a| a.user.email == email) {
            return Err(CookbookError::Conflict("email already registered".to_string()));
        }

        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> CookbookResult<Session> {
        let user = self
            .accounts()
            .iter()
            .find(|a| a.user.email == email && a.password == password)
            .map(|a| a.user.clone())
            .ok_or(CookbookError::Unauthorized)?;
        Ok(self.issue(&user))
    }

    async fn refresh(&self, refresh_token: &str) -> CookbookResult<Session> {
        let user_id = self
            .refresh_tokens
            .lock()
            .ok()
            .and_then(|mut tokens| tokens.remove(refresh_token))
            .ok_or(CookbookError::Unauthorized)?;

        let user = self
            .accounts()
            .iter()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or(CookbookError::Unauthorized)?;
        Ok(self.issue(&user))
    }

    async fn sign_out(&self, refresh_token: &str) -> CookbookResult<()> {
        if let Ok(mut tokens) = self.refresh_tokens.lock() {
            tokens.remove(refresh_token);
        }
        Ok(())
    }
}
