//! Draft fields held while a recipe or collection is being edited

use crate::{
    error::{CookbookError, CookbookResult},
    models::{Collection, CollectionPatch, NewCollection, NewRecipe, Recipe, RecipePatch},
};

/// Push a trimmed value; blank input is ignored
fn push_trimmed(list: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    list.push(value.to_string());
    true
}

fn remove_at(list: &mut Vec<String>, index: usize) -> Option<String> {
    (index < list.len()).then(|| list.remove(index))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Editable copy of a recipe's fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecipeDraft {
    pub title: String,
    pub notes: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub tags: Vec<String>,
}

impl RecipeDraft {
    /// Snapshot the persisted values
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            title: recipe.title.clone(),
            notes: recipe.notes.clone().unwrap_or_default(),
            ingredients: recipe.ingredients.clone(),
            steps: recipe.steps.clone(),
            tags: recipe.tags.clone(),
        }
    }

    pub fn add_ingredient(&mut self, value: &str) -> bool {
        push_trimmed(&mut self.ingredients, value)
    }

    pub fn remove_ingredient(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.ingredients, index)
    }

    pub fn add_step(&mut self, value: &str) -> bool {
        push_trimmed(&mut self.steps, value)
    }

    pub fn remove_step(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.steps, index)
    }

    /// Tags behave like a set: exact duplicates are ignored
    pub fn add_tag(&mut self, value: &str) -> bool {
        if self.tags.iter().any(|t| t == value.trim()) {
            return false;
        }
        push_trimmed(&mut self.tags, value)
    }

    pub fn remove_tag(&mut self, index: usize) -> Option<String> {
        remove_at(&mut self.tags, index)
    }

    /// The trimmed title, or a validation error when it is blank
    pub fn validated_title(&self) -> CookbookResult<String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(CookbookError::Validation("Recipe name is required".to_string()));
        }
        Ok(title.to_string())
    }

    /// Core field update for a save; empty notes persist as null
    pub fn to_patch(&self, title: String, slug: String) -> RecipePatch {
        RecipePatch {
            title: Some(title),
            slug: Some(slug),
            ingredients: Some(self.ingredients.clone()),
            steps: Some(self.steps.clone()),
            notes: Some(non_empty(&self.notes)),
            tags: Some(self.tags.clone()),
            image_path: None,
        }
    }

    pub fn to_new(&self, title: String, slug: String) -> NewRecipe {
        NewRecipe {
            title,
            slug,
            ingredients: self.ingredients.clone(),
            steps: self.steps.clone(),
            notes: non_empty(&self.notes),
            tags: self.tags.clone(),
        }
    }
}

/// Editable copy of a collection's fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionDraft {
    pub name: String,
    pub description: String,
}

impl CollectionDraft {
    pub fn from_collection(collection: &Collection) -> Self {
        Self {
            name: collection.name.clone(),
            description: collection.description.clone().unwrap_or_default(),
        }
    }

    pub fn validated_name(&self) -> CookbookResult<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CookbookError::Validation(
                "Collection name is required".to_string(),
            ));
        }
        Ok(name.to_string())
    }

    /// Description is trimmed; an empty one persists as null
    pub fn to_patch(&self, name: String) -> CollectionPatch {
        CollectionPatch {
            name: Some(name),
            description: Some(non_empty(self.description.trim())),
            image_path: None,
        }
    }

    pub fn to_new(&self, name: String) -> NewCollection {
        NewCollection {
            name,
            description: non_empty(self.description.trim()),
        }
    }
}
