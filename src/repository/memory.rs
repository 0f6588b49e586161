//! In-process storage backend.
//!
//! Each item has its own `tokio::sync::Mutex`; an [`ItemTransaction`] holds it
//! from `begin` until commit or drop, and stages its writes locally so that an
//! abandoned transaction leaves no trace. The shared maps sit behind a
//! `std::sync::RwLock` that is only ever held for short, non-async sections.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{CatalogItem, ItemFields},
        loan::{Loan, NewLoan},
        member::{Borrower, CreateBorrower, Role},
    },
};

use super::{BorrowerDirectory, CatalogStore, ItemTransaction, ItemTransactions, LoanLedger};

#[derive(Debug, Default)]
struct MemoryData {
    items: BTreeMap<i64, CatalogItem>,
    loans: BTreeMap<i64, Loan>,
    borrowers: BTreeMap<i64, Borrower>,
}

impl MemoryData {
    fn identifier_taken(&self, identifier: &str, exclude_id: Option<i64>) -> bool {
        let wanted = identifier.to_lowercase();
        self.items
            .values()
            .any(|item| Some(item.id) != exclude_id && item.identifier.to_lowercase() == wanted)
    }
}

#[derive(Debug)]
struct Inner {
    data: RwLock<MemoryData>,
    item_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    next_item_id: AtomicI64,
    next_loan_id: AtomicI64,
    next_borrower_id: AtomicI64,
    lock_timeout: Duration,
}

/// Catalog, ledger and borrower directory kept in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(MemoryData::default()),
                item_locks: Mutex::new(HashMap::new()),
                next_item_id: AtomicI64::new(1),
                next_loan_id: AtomicI64::new(1),
                next_borrower_id: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, MemoryData>> {
        self.inner
            .data
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, MemoryData>> {
        self.inner
            .data
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    fn item_lock(&self, item_id: i64) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .inner
            .item_locks
            .lock()
            .map_err(|_| AppError::Internal("item lock table poisoned".to_string()))?;
        Ok(locks.entry(item_id).or_default().clone())
    }

    fn forget_item_lock(&self, item_id: i64) {
        if let Ok(mut locks) = self.inner.item_locks.lock() {
            locks.remove(&item_id);
        }
    }

    fn item_not_found(item_id: i64) -> AppError {
        AppError::NotFound(format!("Item with id {} not found", item_id))
    }

    fn loan_not_found(loan_id: i64) -> AppError {
        AppError::NotFound(format!("Loan with id {} not found", loan_id))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert(&self, fields: &ItemFields) -> AppResult<CatalogItem> {
        let mut data = self.write()?;
        if data.identifier_taken(&fields.identifier, None) {
            return Err(AppError::invalid("identifier", "has already been taken"));
        }

        let now = Utc::now();
        let item = CatalogItem {
            id: self.inner.next_item_id.fetch_add(1, Ordering::SeqCst),
            title: fields.title.clone(),
            author: fields.author.clone(),
            genre: fields.genre.clone(),
            identifier: fields.identifier.clone(),
            total_copies: fields.total_copies,
            available_copies: fields.available_copies,
            created_at: now,
            updated_at: now,
        };
        data.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: i64) -> AppResult<CatalogItem> {
        self.read()?
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::item_not_found(id))
    }

    async fn list(&self) -> AppResult<Vec<CatalogItem>> {
        let mut items: Vec<_> = self.read()?.items.values().cloned().collect();
        items.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn identifier_taken(&self, identifier: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        Ok(self.read()?.identifier_taken(identifier, exclude_id))
    }
}

#[async_trait]
impl LoanLedger for MemoryStore {
    async fn get(&self, id: i64) -> AppResult<Loan> {
        self.read()?
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::loan_not_found(id))
    }

    async fn list(&self, borrower_id: Option<i64>, item_id: Option<i64>) -> AppResult<Vec<Loan>> {
        let mut loans: Vec<_> = self
            .read()?
            .loans
            .values()
            .filter(|loan| borrower_id.map_or(true, |id| loan.borrower_id == id))
            .filter(|loan| item_id.map_or(true, |id| loan.item_id == id))
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id)));
        Ok(loans)
    }
}

#[async_trait]
impl BorrowerDirectory for MemoryStore {
    async fn get(&self, id: i64) -> AppResult<Borrower> {
        self.read()?
            .borrowers
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Borrower>> {
        Ok(self.read()?.borrowers.values().cloned().collect())
    }

    async fn register(&self, borrower: &CreateBorrower) -> AppResult<Borrower> {
        let mut data = self.write()?;
        let email = borrower.email.to_lowercase();
        if data.borrowers.values().any(|b| b.email.to_lowercase() == email) {
            return Err(AppError::invalid("email", "has already been taken"));
        }

        let created = Borrower {
            id: self.inner.next_borrower_id.fetch_add(1, Ordering::SeqCst),
            name: borrower.name.clone(),
            email: borrower.email.clone(),
            role: borrower.role.unwrap_or(Role::Member),
            created_at: Utc::now(),
        };
        data.borrowers.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ItemTransactions for MemoryStore {
    async fn begin(&self, item_id: i64) -> AppResult<Box<dyn ItemTransaction>> {
        // Only existing items get a lock entry
        if !self.read()?.items.contains_key(&item_id) {
            return Err(Self::item_not_found(item_id));
        }

        let lock = self.item_lock(item_id)?;
        let guard = tokio::time::timeout(self.inner.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                AppError::Retryable(format!("Timed out waiting for a lock on item {}", item_id))
            })?;

        // The item may have been deleted while we waited
        let item = self
            .read()?
            .items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| Self::item_not_found(item_id))?;

        Ok(Box::new(MemoryItemTransaction {
            _guard: guard,
            store: self.clone(),
            item,
            item_changed: false,
            deleted: false,
            staged_loans: BTreeMap::new(),
        }))
    }
}

pub struct MemoryItemTransaction {
    _guard: OwnedMutexGuard<()>,
    store: MemoryStore,
    item: CatalogItem,
    item_changed: bool,
    deleted: bool,
    staged_loans: BTreeMap<i64, Loan>,
}

#[async_trait]
impl ItemTransaction for MemoryItemTransaction {
    fn item(&self) -> &CatalogItem {
        &self.item
    }

    async fn loan(&mut self, loan_id: i64) -> AppResult<Loan> {
        if let Some(loan) = self.staged_loans.get(&loan_id) {
            return Ok(loan.clone());
        }
        self.store
            .read()?
            .loans
            .get(&loan_id)
            .filter(|loan| loan.item_id == self.item.id)
            .cloned()
            .ok_or_else(|| MemoryStore::loan_not_found(loan_id))
    }

    async fn active_loan_count(&mut self) -> AppResult<i64> {
        let data = self.store.read()?;
        let stored = data
            .loans
            .values()
            .filter(|loan| loan.item_id == self.item.id && !self.staged_loans.contains_key(&loan.id));
        let count = stored
            .chain(self.staged_loans.values())
            .filter(|loan| loan.is_active())
            .count();
        Ok(count as i64)
    }

    async fn set_available_copies(&mut self, available_copies: i32) -> AppResult<()> {
        self.item.available_copies = available_copies;
        self.item.updated_at = Utc::now();
        self.item_changed = true;
        Ok(())
    }

    async fn update_fields(&mut self, fields: &ItemFields) -> AppResult<()> {
        self.item.title = fields.title.clone();
        self.item.author = fields.author.clone();
        self.item.genre = fields.genre.clone();
        self.item.identifier = fields.identifier.clone();
        self.item.total_copies = fields.total_copies;
        self.item.available_copies = fields.available_copies;
        self.item.updated_at = Utc::now();
        self.item_changed = true;
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let created = Loan {
            id: self.store.inner.next_loan_id.fetch_add(1, Ordering::SeqCst),
            item_id: loan.item_id,
            borrower_id: loan.borrower_id,
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: None,
        };
        self.staged_loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn mark_returned(&mut self, loan_id: i64, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let mut loan = self.loan(loan_id).await?;
        if !loan.is_active() {
            return Err(AppError::AlreadyReturned(format!("Loan {} was already returned", loan_id)));
        }
        loan.returned_at = Some(returned_at);
        self.staged_loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn delete_item(&mut self) -> AppResult<()> {
        self.deleted = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let item_id = self.item.id;
        {
            let mut data = self.store.write()?;

            if self.deleted {
                data.items.remove(&item_id);
                data.loans.retain(|_, loan| loan.item_id != item_id);
            } else {
                if self.item_changed {
                    let item = &self.item;
                    if item.available_copies < 0 || item.available_copies > item.total_copies {
                        return Err(AppError::Internal(format!(
                            "item {} would hold {} of {} copies",
                            item_id, item.available_copies, item.total_copies
                        )));
                    }
                    if data.identifier_taken(&item.identifier, Some(item_id)) {
                        return Err(AppError::invalid("identifier", "has already been taken"));
                    }
                    data.items.insert(item_id, item.clone());
                }
                for (id, loan) in &self.staged_loans {
                    data.loans.insert(*id, loan.clone());
                }
            }
        }

        if self.deleted {
            self.store.forget_item_lock(item_id);
        }
        Ok(())
    }
}
