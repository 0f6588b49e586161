//! Data models for the circulation engine

pub mod item;
pub mod loan;
pub mod member;
pub mod stats;

// Re-export commonly used types
pub use item::{CatalogItem, CreateItem, ItemFilter, ItemQuery, UpdateItem};
pub use loan::{Loan, LoanDetails, LoanFilter, LoanQuery, LoanStatus, OverdueBorrower};
pub use member::{Borrower, Claims, CreateBorrower, Role};
pub use stats::CirculationStats;
