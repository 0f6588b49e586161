//! Circulation coordinator: check-out and check-in.
//!
//! Both operations run inside a single [`ItemTransaction`](crate::repository::ItemTransaction),
//! so the availability check, the copy-count change and the loan write are one
//! indivisible step per item.

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, NewLoan},
    repository::Repository,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    loan_period: Duration,
}

impl CirculationService {
    pub fn new(repository: Repository, loan_period: Duration) -> Self {
        Self {
            repository,
            loan_period,
        }
    }

    /// Claim one copy of an item for a borrower
    pub async fn check_out(
        &self,
        item_id: i64,
        borrower_id: i64,
        due_at: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        self.repository.borrowers.get(borrower_id).await?;

        let mut tx = self.repository.transactions.begin(item_id).await?;
        let available = tx.item().available_copies;
        if available <= 0 {
            tracing::debug!(item_id, borrower_id, "Check-out refused: no copies available");
            return Err(AppError::ItemUnavailable(format!(
                "Item {} has no copies available",
                item_id
            )));
        }

        let now = Utc::now();
        tx.set_available_copies(available - 1).await?;
        let loan = tx
            .insert_loan(&NewLoan {
                item_id,
                borrower_id,
                borrowed_at: now,
                due_at: due_at.unwrap_or(now + self.loan_period),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            item_id,
            borrower_id,
            due_at = %loan.due_at,
            "Item checked out ({} copies left)",
            available - 1
        );
        Ok(loan)
    }

    /// Return the copy held by a loan
    pub async fn check_in(&self, loan_id: i64) -> AppResult<Loan> {
        let loan = self.repository.loans.get(loan_id).await?;
        if !loan.is_active() {
            return Err(already_returned(loan_id));
        }

        let mut tx = self.repository.transactions.begin(loan.item_id).await?;

        // Another check-in may have won the race for the lock
        if !tx.loan(loan_id).await?.is_active() {
            return Err(already_returned(loan_id));
        }

        let item = tx.item().clone();
        let restored = if item.available_copies >= item.total_copies {
            tracing::warn!(
                item_id = item.id,
                "Check-in with all {} copies already on the shelf; capping",
                item.total_copies
            );
            item.total_copies
        } else {
            item.available_copies + 1
        };
        tx.set_available_copies(restored).await?;
        let returned = tx.mark_returned(loan_id, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(loan_id, item_id = item.id, "Item checked in");
        Ok(returned)
    }

    pub async fn get_loan(&self, loan_id: i64) -> AppResult<Loan> {
        self.repository.loans.get(loan_id).await
    }
}

fn already_returned(loan_id: i64) -> AppError {
    tracing::debug!(loan_id, "Check-in refused: loan already returned");
    AppError::AlreadyReturned(format!("Loan {} was already returned", loan_id))
}
