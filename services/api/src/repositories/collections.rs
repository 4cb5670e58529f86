//! Collection repository

use common::error::DatabaseResult;
use cookbook::models::{Collection, CollectionPatch, NewCollection};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

fn collection_from_row(row: &PgRow) -> Collection {
    Collection {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        image_path: row.get("image_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Collection repository for database operations
#[derive(Clone)]
pub struct CollectionRepository {
    pool: PgPool,
}

impl CollectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest collections first
    pub async fn list(&self, owner: Uuid) -> DatabaseResult<Vec<Collection>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, description, image_path, created_at, updated_at
            FROM collections
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(collection_from_row).collect())
    }

    pub async fn find_by_id(&self, owner: Uuid, id: Uuid) -> DatabaseResult<Option<Collection>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, description, image_path, created_at, updated_at
            FROM collections
            WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(collection_from_row))
    }

    pub async fn create(&self, owner: Uuid, collection: &NewCollection) -> DatabaseResult<Collection> {
        let row = sqlx::query(
            r#"
            INSERT INTO collections (user_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, description, image_path, created_at, updated_at
            "#,
        )
        .bind(owner)
        .bind(&collection.name)
        .bind(&collection.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(collection_from_row(&row))
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &CollectionPatch,
    ) -> DatabaseResult<Option<Collection>> {
        let row = sqlx::query(
            r#"
            UPDATE collections SET
                name = COALESCE($3, name),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                image_path = CASE WHEN $6 THEN $7 ELSE image_path END,
                updated_at = NOW()
            WHERE user_id = $1 AND id = $2
            RETURNING id, user_id, name, description, image_path, created_at, updated_at
            "#,
        )
        .bind(owner)
        .bind(id)
        .bind(&patch.name)
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.image_path.is_some())
        .bind(patch.image_path.clone().flatten())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(collection_from_row))
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE user_id = $1 AND id = $2")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
