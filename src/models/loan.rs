//! Loan model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::member::Borrower;

/// Loan row as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub item_id: i64,
    pub borrower_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// Derived loan state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_at < now
    }

    /// Active and due on the given calendar day (UTC)
    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.is_active() && self.due_at.date_naive() == day
    }

    pub fn status(&self, now: DateTime<Utc>) -> LoanStatus {
        if !self.is_active() {
            LoanStatus::Returned
        } else if self.is_overdue(now) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }
}

/// Values for a loan about to be recorded
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub item_id: i64,
    pub borrower_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Loan with its derived status, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub status: LoanStatus,
}

impl LoanDetails {
    pub fn at(loan: Loan, now: DateTime<Utc>) -> Self {
        let status = loan.status(now);
        Self { loan, status }
    }
}

/// Check-out request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckOutRequest {
    pub item_id: i64,
    /// Defaults to the authenticated borrower
    pub borrower_id: Option<i64>,
    /// Defaults to now plus the configured loan period
    pub due_at: Option<DateTime<Utc>>,
}

/// Loan listing filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanFilter {
    Active,
    Returned,
    DueToday,
    Overdue,
}

/// Loan query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub borrower_id: Option<i64>,
    /// Loans of one catalog item
    pub item_id: Option<i64>,
    pub filter: Option<LoanFilter>,
}

/// A borrower together with only their overdue loans
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverdueBorrower {
    pub borrower: Borrower,
    pub loans: Vec<LoanDetails>,
}
