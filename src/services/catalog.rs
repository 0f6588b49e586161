//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::item::{CatalogItem, CreateItem, UpdateItem},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get item by ID
    pub async fn get_item(&self, id: i64) -> AppResult<CatalogItem> {
        self.repository.items.get(id).await
    }

    /// Create a new item; available copies default to the total
    pub async fn create_item(&self, item: CreateItem) -> AppResult<CatalogItem> {
        let fields = item.into_fields()?;

        if self.repository.items.identifier_taken(&fields.identifier, None).await? {
            return Err(AppError::invalid("identifier", "has already been taken"));
        }

        let created = self.repository.items.insert(&fields).await?;
        tracing::info!(
            "Catalog create: item id={} identifier={} copies={}",
            created.id,
            created.identifier,
            created.total_copies
        );
        Ok(created)
    }

    /// Apply a partial update under the item's lock.
    ///
    /// The merged record goes through the same checks as creation, so the copy
    /// counts stay within bounds; a concurrent check-out is never overwritten.
    pub async fn update_item(&self, id: i64, patch: UpdateItem) -> AppResult<CatalogItem> {
        let mut tx = self.repository.transactions.begin(id).await?;
        let fields = patch.merge_onto(tx.item()).into_fields()?;

        if self.repository.items.identifier_taken(&fields.identifier, Some(id)).await? {
            return Err(AppError::invalid("identifier", "has already been taken"));
        }

        tx.update_fields(&fields).await?;
        let updated = tx.item().clone();
        tx.commit().await?;

        tracing::info!("Catalog update: item id={}", id);
        Ok(updated)
    }

    /// Delete an item; refused while copies are out on loan
    pub async fn delete_item(&self, id: i64) -> AppResult<()> {
        let mut tx = self.repository.transactions.begin(id).await?;

        let active = tx.active_loan_count().await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "Item {} has {} active loan(s) and cannot be deleted",
                id, active
            )));
        }

        tx.delete_item().await?;
        tx.commit().await?;

        tracing::info!("Catalog delete: item id={}", id);
        Ok(())
    }
}
