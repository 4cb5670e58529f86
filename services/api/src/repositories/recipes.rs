//! Recipe repository

use common::error::DatabaseResult;
use cookbook::models::{NewRecipe, Recipe, RecipePatch, RecipeSummary, SlugEntry};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

const RECIPE_COLUMNS: &str = "id, user_id, title, slug, ingredients, steps, notes, tags, \
     image_path, created_at, updated_at";

const SUMMARY_COLUMNS: &str = "id, title, slug, notes, tags, image_path, updated_at";

fn recipe_from_row(row: &PgRow) -> Recipe {
    Recipe {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        ingredients: row.get("ingredients"),
        steps: row.get("steps"),
        notes: row.get("notes"),
        tags: row.get("tags"),
        image_path: row.get("image_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn summary_from_row(row: &PgRow) -> RecipeSummary {
    RecipeSummary {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        notes: row.get("notes"),
        tags: row.get("tags"),
        image_path: row.get("image_path"),
        updated_at: row.get("updated_at"),
    }
}

/// Recipe repository for database operations
#[derive(Clone)]
pub struct RecipeRepository {
    pool: PgPool,
}

impl RecipeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recently updated recipes first; no limit returns them all
    pub async fn recent(&self, owner: Uuid, limit: Option<i64>) -> DatabaseResult<Vec<RecipeSummary>> {
        let query = format!(
            "SELECT {} FROM recipes WHERE user_id = $1 ORDER BY updated_at DESC LIMIT $2",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    pub async fn find_by_slug(&self, owner: Uuid, slug: &str) -> DatabaseResult<Option<Recipe>> {
        let query = format!(
            "SELECT {} FROM recipes WHERE user_id = $1 AND slug = $2",
            RECIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(owner)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(recipe_from_row))
    }

    pub async fn find_by_id(&self, owner: Uuid, id: Uuid) -> DatabaseResult<Option<Recipe>> {
        let query = format!(
            "SELECT {} FROM recipes WHERE user_id = $1 AND id = $2",
            RECIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(owner)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(recipe_from_row))
    }

    /// Summaries for the given ids; unknown or foreign ids are skipped
    pub async fn find_by_ids(&self, owner: Uuid, ids: &[Uuid]) -> DatabaseResult<Vec<RecipeSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {} FROM recipes WHERE user_id = $1 AND id = ANY($2) ORDER BY updated_at DESC",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(owner)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    /// Slugs starting with `prefix`, compared literally so `_` and `%` match
    /// themselves
    pub async fn slugs_with_prefix(&self, owner: Uuid, prefix: &str) -> DatabaseResult<Vec<SlugEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, slug FROM recipes
            WHERE user_id = $1 AND left(slug, length($2::text)) = $2::text
            "#,
        )
        .bind(owner)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SlugEntry {
                id: row.get("id"),
                slug: row.get("slug"),
            })
            .collect())
    }

    pub async fn create(&self, owner: Uuid, recipe: &NewRecipe) -> DatabaseResult<Recipe> {
        let query = format!(
            r#"
            INSERT INTO recipes (user_id, title, slug, ingredients, steps, notes, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RECIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(owner)
            .bind(&recipe.title)
            .bind(&recipe.slug)
            .bind(&recipe.ingredients)
            .bind(&recipe.steps)
            .bind(&recipe.notes)
            .bind(&recipe.tags)
            .fetch_one(&self.pool)
            .await?;

        Ok(recipe_from_row(&row))
    }

    /// Apply a partial update; `None` when the recipe does not exist
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &RecipePatch,
    ) -> DatabaseResult<Option<Recipe>> {
        let query = format!(
            r#"
            UPDATE recipes SET
                title = COALESCE($3, title),
                slug = COALESCE($4, slug),
                ingredients = COALESCE($5, ingredients),
                steps = COALESCE($6, steps),
                notes = CASE WHEN $7 THEN $8 ELSE notes END,
                tags = COALESCE($9, tags),
                image_path = CASE WHEN $10 THEN $11 ELSE image_path END,
                updated_at = NOW()
            WHERE user_id = $1 AND id = $2
            RETURNING {}
            "#,
            RECIPE_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(owner)
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.slug)
            .bind(&patch.ingredients)
            .bind(&patch.steps)
            .bind(patch.notes.is_some())
            .bind(patch.notes.clone().flatten())
            .bind(&patch.tags)
            .bind(patch.image_path.is_some())
            .bind(patch.image_path.clone().flatten())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(recipe_from_row))
    }

    /// Delete a recipe; false when nothing matched
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE user_id = $1 AND id = $2")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
