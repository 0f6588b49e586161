//! Library circulation server
//!
//! Tracks a catalog of items with a fixed number of physical copies, and the
//! loans that move those copies between the shelf and borrowers. Check-out
//! and check-in are serialized per item, so available copy counts never leave
//! `0..=total_copies` under concurrent traffic.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
