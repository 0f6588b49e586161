//! Repository layer: storage seams for the catalog, the loan ledger and borrowers.
//!
//! Every state change that touches an item's copy counts goes through an
//! [`ItemTransaction`], which holds that item exclusively until it is committed
//! or dropped. Dropping a transaction without committing discards its writes.

pub mod borrowers;
pub mod items;
pub mod loans;
pub mod memory;
pub mod transaction;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        item::{CatalogItem, ItemFields},
        loan::{Loan, NewLoan},
        member::{Borrower, CreateBorrower},
    },
};

/// Catalog items, read side plus creation
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert(&self, fields: &ItemFields) -> AppResult<CatalogItem>;

    async fn get(&self, id: i64) -> AppResult<CatalogItem>;

    /// All items ordered by title
    async fn list(&self) -> AppResult<Vec<CatalogItem>>;

    /// Case-insensitive identifier lookup, optionally ignoring one item
    async fn identifier_taken(&self, identifier: &str, exclude_id: Option<i64>) -> AppResult<bool>;
}

/// Loan records, read side
#[async_trait]
pub trait LoanLedger: Send + Sync {
    async fn get(&self, id: i64) -> AppResult<Loan>;

    /// Loans, most recently borrowed first, optionally for a single borrower
    /// and/or a single item
    async fn list(&self, borrower_id: Option<i64>, item_id: Option<i64>) -> AppResult<Vec<Loan>>;
}

/// Borrower identities mirrored from the identity subsystem
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowerDirectory: Send + Sync {
    async fn get(&self, id: i64) -> AppResult<Borrower>;

    async fn list(&self) -> AppResult<Vec<Borrower>>;

    async fn register(&self, borrower: &CreateBorrower) -> AppResult<Borrower>;
}

/// Starts per-item atomic units of work
#[async_trait]
pub trait ItemTransactions: Send + Sync {
    /// Lock the item and load it.
    ///
    /// Fails with `NotFound` for an unknown item and `Retryable` when the lock
    /// cannot be taken within the configured timeout.
    async fn begin(&self, item_id: i64) -> AppResult<Box<dyn ItemTransaction>>;
}

/// Exclusive, all-or-nothing access to one item and its loans
#[async_trait]
pub trait ItemTransaction: Send {
    /// The item as seen inside this transaction, including staged writes
    fn item(&self) -> &CatalogItem;

    async fn loan(&mut self, loan_id: i64) -> AppResult<Loan>;

    async fn active_loan_count(&mut self) -> AppResult<i64>;

    async fn set_available_copies(&mut self, available_copies: i32) -> AppResult<()>;

    async fn update_fields(&mut self, fields: &ItemFields) -> AppResult<()>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    async fn mark_returned(&mut self, loan_id: i64, returned_at: DateTime<Utc>) -> AppResult<Loan>;

    async fn delete_item(&mut self) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Main repository struct holding every storage seam
#[derive(Clone)]
pub struct Repository {
    pub items: Arc<dyn CatalogStore>,
    pub loans: Arc<dyn LoanLedger>,
    pub borrowers: Arc<dyn BorrowerDirectory>,
    pub transactions: Arc<dyn ItemTransactions>,
}

impl Repository {
    /// Repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self {
            items: Arc::new(items::ItemsRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            borrowers: Arc::new(borrowers::BorrowersRepository::new(pool.clone())),
            transactions: Arc::new(transaction::PgItemTransactions::new(pool, lock_timeout)),
        }
    }

    /// Repository kept entirely in process memory
    pub fn in_memory(lock_timeout: Duration) -> Self {
        let store = memory::MemoryStore::new(lock_timeout);
        Self {
            items: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            borrowers: Arc::new(store.clone()),
            transactions: Arc::new(store),
        }
    }
}
