//! Borrowers repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::member::{Borrower, CreateBorrower, Role},
};

use super::BorrowerDirectory;

#[derive(Clone)]
pub struct BorrowersRepository {
    pool: Pool<Postgres>,
}

impl BorrowersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowerDirectory for BorrowersRepository {
    async fn get(&self, id: i64) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Borrower>> {
        let borrowers = sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(borrowers)
    }

    async fn register(&self, borrower: &CreateBorrower) -> AppResult<Borrower> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrowers WHERE LOWER(email) = LOWER($1))",
        )
        .bind(&borrower.email)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(AppError::invalid("email", "has already been taken"));
        }

        let created = sqlx::query_as::<_, Borrower>(
            r#"
            INSERT INTO borrowers (name, email, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&borrower.name)
        .bind(&borrower.email)
        .bind(borrower.role.unwrap_or(Role::Member))
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
