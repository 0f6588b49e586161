//! Listing views over the catalog and the loan ledger.
//!
//! Every view is recomputed from current store state on each call. The
//! filtering itself lives in plain functions taking an explicit `now`, so the
//! date-sensitive views are deterministic under test.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        item::{CatalogItem, ItemFilter, ItemQuery},
        loan::{Loan, LoanDetails, LoanFilter, LoanQuery, OverdueBorrower},
        member::Borrower,
        stats::CirculationStats,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct QueryService {
    repository: Repository,
}

impl QueryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Items matching the optional search text and filter, ordered by title
    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<CatalogItem>> {
        let items = search_items(self.repository.items.list().await?, query.search.as_deref());

        match query.filter {
            None => Ok(items),
            Some(filter) => {
                let loans = if filter == ItemFilter::DueToday {
                    self.repository.loans.list(None, None).await?
                } else {
                    Vec::new()
                };
                Ok(filter_items(items, filter, &loans, Utc::now()))
            }
        }
    }

    /// Loans, most recent first, optionally narrowed to one borrower, one item
    /// and one filter
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let loans = self
            .repository
            .loans
            .list(query.borrower_id, query.item_id)
            .await?;
        let loans = match query.filter {
            Some(filter) => filter_loans(loans, filter, now),
            None => loans,
        };
        Ok(loans.into_iter().map(|l| LoanDetails::at(l, now)).collect())
    }

    /// Borrowers with at least one overdue loan, each with only those loans
    pub async fn overdue_by_borrower(&self) -> AppResult<Vec<OverdueBorrower>> {
        let borrowers = self.repository.borrowers.list().await?;
        let loans = self.repository.loans.list(None, None).await?;
        Ok(overdue_by_borrower(borrowers, loans, Utc::now()))
    }

    pub async fn stats(&self) -> AppResult<CirculationStats> {
        let items = self.repository.items.list().await?;
        let loans = self.repository.loans.list(None, None).await?;
        Ok(circulation_stats(&items, &loans, Utc::now()))
    }
}

/// Case-insensitive substring match on title, author or genre
pub fn matches_search(item: &CatalogItem, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    item.title.to_lowercase().contains(&needle)
        || item.author.to_lowercase().contains(&needle)
        || item
            .genre
            .as_deref()
            .is_some_and(|g| g.to_lowercase().contains(&needle))
}

/// Blank or absent text keeps every item
pub fn search_items(items: Vec<CatalogItem>, text: Option<&str>) -> Vec<CatalogItem> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(needle) => items
            .into_iter()
            .filter(|item| matches_search(item, needle))
            .collect(),
        None => items,
    }
}

pub fn filter_items(
    items: Vec<CatalogItem>,
    filter: ItemFilter,
    loans: &[Loan],
    now: DateTime<Utc>,
) -> Vec<CatalogItem> {
    match filter {
        ItemFilter::Available => items.into_iter().filter(CatalogItem::is_available).collect(),
        ItemFilter::Borrowed => items
            .into_iter()
            .filter(|i| i.borrowed_copies() > 0)
            .collect(),
        ItemFilter::DueToday => {
            let today = now.date_naive();
            let due: HashSet<i64> = loans
                .iter()
                .filter(|l| l.is_due_on(today))
                .map(|l| l.item_id)
                .collect();
            items.into_iter().filter(|i| due.contains(&i.id)).collect()
        }
    }
}

pub fn filter_loans(loans: Vec<Loan>, filter: LoanFilter, now: DateTime<Utc>) -> Vec<Loan> {
    let today = now.date_naive();
    loans
        .into_iter()
        .filter(|l| match filter {
            LoanFilter::Active => l.is_active(),
            LoanFilter::Returned => !l.is_active(),
            LoanFilter::DueToday => l.is_due_on(today),
            LoanFilter::Overdue => l.is_overdue(now),
        })
        .collect()
}

/// Group overdue loans by borrower; borrowers without any are left out
pub fn overdue_by_borrower(
    borrowers: Vec<Borrower>,
    loans: Vec<Loan>,
    now: DateTime<Utc>,
) -> Vec<OverdueBorrower> {
    let mut overdue: BTreeMap<i64, Vec<LoanDetails>> = BTreeMap::new();
    for loan in loans.into_iter().filter(|l| l.is_overdue(now)) {
        overdue
            .entry(loan.borrower_id)
            .or_default()
            .push(LoanDetails::at(loan, now));
    }

    let mut result: Vec<OverdueBorrower> = borrowers
        .into_iter()
        .filter_map(|borrower| {
            overdue
                .remove(&borrower.id)
                .map(|loans| OverdueBorrower { borrower, loans })
        })
        .collect();
    result.sort_by_key(|entry| entry.borrower.id);

    if !overdue.is_empty() {
        tracing::warn!(
            "Overdue loans reference {} unknown borrower(s)",
            overdue.len()
        );
    }

    result
}

pub fn circulation_stats(items: &[CatalogItem], loans: &[Loan], now: DateTime<Utc>) -> CirculationStats {
    let today = now.date_naive();
    CirculationStats {
        items: items.len() as i64,
        total_copies: items.iter().map(|i| i.total_copies as i64).sum(),
        available_copies: items.iter().map(|i| i.available_copies as i64).sum(),
        active_loans: loans.iter().filter(|l| l.is_active()).count() as i64,
        overdue_loans: loans.iter().filter(|l| l.is_overdue(now)).count() as i64,
        due_today: loans.iter().filter(|l| l.is_due_on(today)).count() as i64,
        returned_loans: loans.iter().filter(|l| !l.is_active()).count() as i64,
    }
}
