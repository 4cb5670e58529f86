//! Recipe, collection and membership models shared by the client and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Recipe entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recipe card projection used by listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_path: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Recipe> for RecipeSummary {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            slug: recipe.slug.clone(),
            notes: recipe.notes.clone(),
            tags: recipe.tags.clone(),
            image_path: recipe.image_path.clone(),
            updated_at: recipe.updated_at,
        }
    }
}

/// Row returned by a slug prefix probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugEntry {
    pub id: Uuid,
    pub slug: String,
}

/// New recipe creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Recipe update payload
///
/// Absent fields are left unchanged. `notes` and `image_path` distinguish
/// "absent" (`None`) from "set to null" (`Some(None)`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecipePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub image_path: Option<Option<String>>,
}

impl RecipePatch {
    /// Patch touching only the cover image path
    pub fn image_path(path: Option<String>) -> Self {
        Self {
            image_path: Some(path),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a recipe in place
    pub fn apply_to(&self, recipe: &mut Recipe) {
        if let Some(title) = &self.title {
            recipe.title = title.clone();
        }
        if let Some(slug) = &self.slug {
            recipe.slug = slug.clone();
        }
        if let Some(ingredients) = &self.ingredients {
            recipe.ingredients = ingredients.clone();
        }
        if let Some(steps) = &self.steps {
            recipe.steps = steps.clone();
        }
        if let Some(notes) = &self.notes {
            recipe.notes = notes.clone();
        }
        if let Some(tags) = &self.tags {
            recipe.tags = tags.clone();
        }
        if let Some(image_path) = &self.image_path {
            recipe.image_path = image_path.clone();
        }
    }
}

/// Collection entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New collection creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCollection {
    pub name: String,
    pub description: Option<String>,
}

/// Collection update payload, same absent/null rules as [`RecipePatch`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub image_path: Option<Option<String>>,
}

impl CollectionPatch {
    pub fn image_path(path: Option<String>) -> Self {
        Self {
            image_path: Some(path),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, collection: &mut Collection) {
        if let Some(name) = &self.name {
            collection.name = name.clone();
        }
        if let Some(description) = &self.description {
            collection.description = description.clone();
        }
        if let Some(image_path) = &self.image_path {
            collection.image_path = image_path.clone();
        }
    }
}

/// Join row linking a recipe to a collection under its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecipe {
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub recipe_id: Uuid,
    pub added_at: DateTime<Utc>,
}

/// Owner-less link key, used for inserts and deletes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub collection_id: Uuid,
    pub recipe_id: Uuid,
}

impl From<&CollectionRecipe> for Link {
    fn from(row: &CollectionRecipe) -> Self {
        Self {
            collection_id: row.collection_id,
            recipe_id: row.recipe_id,
        }
    }
}

/// Treat an explicit JSON `null` as `Some(None)` instead of `None`
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let absent: RecipePatch = serde_json::from_value(json!({ "title": "Soup" })).unwrap();
        assert_eq!(absent.image_path, None);
        assert_eq!(absent.title.as_deref(), Some("Soup"));

        let cleared: RecipePatch = serde_json::from_value(json!({ "image_path": null })).unwrap();
        assert_eq!(cleared.image_path, Some(None));
    }

    #[test]
    fn test_patch_serializes_only_touched_fields() {
        let patch = CollectionPatch::image_path(None);
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "image_path": null }));
        assert!(CollectionPatch::default().is_empty());
    }
}
