//! PostgreSQL per-item transactions.
//!
//! The item row is locked with `SELECT ... FOR UPDATE` for the life of the
//! transaction, so check-out, check-in, edits and deletion of one item are
//! serialized while other items proceed independently. A `lock_timeout` bounds
//! the wait; its expiry surfaces as `AppError::Retryable`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CatalogItem, ItemFields},
        loan::{Loan, NewLoan},
    },
};

use super::{ItemTransaction, ItemTransactions};

#[derive(Clone)]
pub struct PgItemTransactions {
    pool: Pool<Postgres>,
    lock_timeout: Duration,
}

impl PgItemTransactions {
    pub fn new(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl ItemTransactions for PgItemTransactions {
    async fn begin(&self, item_id: i64) -> AppResult<Box<dyn ItemTransaction>> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        let item = sqlx::query_as::<_, CatalogItem>(
            "SELECT * FROM catalog_items WHERE id = $1 FOR UPDATE",
        )
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", item_id)))?;

        Ok(Box::new(PgItemTransaction { tx, item }))
    }
}

pub struct PgItemTransaction {
    tx: Transaction<'static, Postgres>,
    item: CatalogItem,
}

#[async_trait]
impl ItemTransaction for PgItemTransaction {
    fn item(&self) -> &CatalogItem {
        &self.item
    }

    async fn loan(&mut self, loan_id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 AND item_id = $2")
            .bind(loan_id)
            .bind(self.item.id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    async fn active_loan_count(&mut self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE item_id = $1 AND returned_at IS NULL",
        )
        .bind(self.item.id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn set_available_copies(&mut self, available_copies: i32) -> AppResult<()> {
        self.item = sqlx::query_as::<_, CatalogItem>(
            r#"
            UPDATE catalog_items
            SET available_copies = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(available_copies)
        .bind(self.item.id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_fields(&mut self, fields: &ItemFields) -> AppResult<()> {
        self.item = sqlx::query_as::<_, CatalogItem>(
            r#"
            UPDATE catalog_items
            SET title = $1, author = $2, genre = $3, identifier = $4,
                total_copies = $5, available_copies = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.genre)
        .bind(&fields.identifier)
        .bind(fields.total_copies)
        .bind(fields.available_copies)
        .bind(self.item.id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (item_id, borrower_id, borrowed_at, due_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(loan.item_id)
        .bind(loan.borrower_id)
        .bind(loan.borrowed_at)
        .bind(loan.due_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn mark_returned(&mut self, loan_id: i64, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET returned_at = $1
            WHERE id = $2 AND item_id = $3 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(returned_at)
        .bind(loan_id)
        .bind(self.item.id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::AlreadyReturned(format!("Loan {} was already returned", loan_id)))
    }

    async fn delete_item(&mut self) -> AppResult<()> {
        sqlx::query("DELETE FROM catalog_items WHERE id = $1")
            .bind(self.item.id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
