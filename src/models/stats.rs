//! Circulation summary counters

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Snapshot of catalog stock and loan activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CirculationStats {
    pub items: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub due_today: i64,
    pub returned_loans: i64,
}
