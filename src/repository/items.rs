//! Catalog items repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::item::{CatalogItem, ItemFields},
};

use super::CatalogStore;

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for ItemsRepository {
    async fn insert(&self, fields: &ItemFields) -> AppResult<CatalogItem> {
        let item = sqlx::query_as::<_, CatalogItem>(
            r#"
            INSERT INTO catalog_items (title, author, genre, identifier, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.genre)
        .bind(&fields.identifier)
        .bind(fields.total_copies)
        .bind(fields.available_copies)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    async fn get(&self, id: i64) -> AppResult<CatalogItem> {
        sqlx::query_as::<_, CatalogItem>("SELECT * FROM catalog_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<CatalogItem>> {
        let items = sqlx::query_as::<_, CatalogItem>("SELECT * FROM catalog_items ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn identifier_taken(&self, identifier: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM catalog_items
                WHERE LOWER(identifier) = LOWER($1)
                  AND ($2::BIGINT IS NULL OR id != $2)
            )
            "#,
        )
        .bind(identifier)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
