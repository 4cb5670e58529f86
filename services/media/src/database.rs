use common::error::DatabaseResult;
use sqlx::{PgPool, Row};
use std::collections::HashSet;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every image path still referenced by a recipe or a collection
    pub async fn referenced_image_paths(&self) -> DatabaseResult<HashSet<String>> {
        let rows = sqlx::query(
            "SELECT image_path FROM recipes WHERE image_path IS NOT NULL
             UNION
             SELECT image_path FROM collections WHERE image_path IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let paths = rows.into_iter().map(|row| row.get("image_path")).collect();

        Ok(paths)
    }
}
