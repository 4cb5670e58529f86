//! Collection membership repository

use common::error::DatabaseResult;
use cookbook::models::{CollectionRecipe, Link};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashSet;
use uuid::Uuid;

fn link_from_row(row: &PgRow) -> CollectionRecipe {
    CollectionRecipe {
        user_id: row.get("user_id"),
        collection_id: row.get("collection_id"),
        recipe_id: row.get("recipe_id"),
        added_at: row.get("added_at"),
    }
}

/// Split links into parallel id arrays for `UNNEST`
fn columns(links: &[Link]) -> (Vec<Uuid>, Vec<Uuid>) {
    links
        .iter()
        .map(|link| (link.collection_id, link.recipe_id))
        .unzip()
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    ids.collect::<HashSet<_>>().into_iter().collect()
}

/// Link repository for database operations
#[derive(Clone)]
pub struct LinkRepository {
    pool: PgPool,
}

impl LinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recipes in a collection, most recently added first
    pub async fn for_collection(
        &self,
        owner: Uuid,
        collection_id: Uuid,
    ) -> DatabaseResult<Vec<CollectionRecipe>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, collection_id, recipe_id, added_at
            FROM collection_recipes
            WHERE user_id = $1 AND collection_id = $2
            ORDER BY added_at DESC
            "#,
        )
        .bind(owner)
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(link_from_row).collect())
    }

    /// Collections holding a recipe, most recently added first
    pub async fn for_recipe(
        &self,
        owner: Uuid,
        recipe_id: Uuid,
    ) -> DatabaseResult<Vec<CollectionRecipe>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, collection_id, recipe_id, added_at
            FROM collection_recipes
            WHERE user_id = $1 AND recipe_id = $2
            ORDER BY added_at DESC
            "#,
        )
        .bind(owner)
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(link_from_row).collect())
    }

    /// True when every collection and recipe referenced by `links` belongs
    /// to `owner`
    pub async fn owns_all(&self, owner: Uuid, links: &[Link]) -> DatabaseResult<bool> {
        let collections = distinct(links.iter().map(|l| l.collection_id));
        let recipes = distinct(links.iter().map(|l| l.recipe_id));

        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM collections WHERE user_id = $1 AND id = ANY($2)) AS collections,
                (SELECT COUNT(*) FROM recipes WHERE user_id = $1 AND id = ANY($3)) AS recipes
            "#,
        )
        .bind(owner)
        .bind(&collections)
        .bind(&recipes)
        .fetch_one(&self.pool)
        .await?;

        let found_collections: i64 = row.get("collections");
        let found_recipes: i64 = row.get("recipes");

        Ok(found_collections as usize == collections.len() && found_recipes as usize == recipes.len())
    }

    /// Insert links; rows that already exist keep their original `added_at`
    pub async fn insert(&self, owner: Uuid, links: &[Link]) -> DatabaseResult<u64> {
        if links.is_empty() {
            return Ok(0);
        }

        let (collection_ids, recipe_ids) = columns(links);
        let result = sqlx::query(
            r#"
            INSERT INTO collection_recipes (user_id, collection_id, recipe_id)
            SELECT $1, link.collection_id, link.recipe_id
            FROM UNNEST($2::uuid[], $3::uuid[]) AS link (collection_id, recipe_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(owner)
        .bind(&collection_ids)
        .bind(&recipe_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(&self, owner: Uuid, links: &[Link]) -> DatabaseResult<u64> {
        if links.is_empty() {
            return Ok(0);
        }

        let (collection_ids, recipe_ids) = columns(links);
        let result = sqlx::query(
            r#"
            DELETE FROM collection_recipes
            WHERE user_id = $1
              AND (collection_id, recipe_id) IN (
                  SELECT * FROM UNNEST($2::uuid[], $3::uuid[])
              )
            "#,
        )
        .bind(owner)
        .bind(&collection_ids)
        .bind(&recipe_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn clear_collection(&self, owner: Uuid, collection_id: Uuid) -> DatabaseResult<u64> {
        let result =
            sqlx::query("DELETE FROM collection_recipes WHERE user_id = $1 AND collection_id = $2")
                .bind(owner)
                .bind(collection_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    pub async fn clear_recipe(&self, owner: Uuid, recipe_id: Uuid) -> DatabaseResult<u64> {
        let result =
            sqlx::query("DELETE FROM collection_recipes WHERE user_id = $1 AND recipe_id = $2")
                .bind(owner)
                .bind(recipe_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
