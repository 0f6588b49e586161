//! Loans repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::Loan,
};

use super::LoanLedger;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanLedger for LoansRepository {
    async fn get(&self, id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn list(&self, borrower_id: Option<i64>, item_id: Option<i64>) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE ($1::BIGINT IS NULL OR borrower_id = $1)
              AND ($2::BIGINT IS NULL OR item_id = $2)
            ORDER BY borrowed_at DESC, id DESC
            "#,
        )
        .bind(borrower_id)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
