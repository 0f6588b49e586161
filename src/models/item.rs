//! Catalog item model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult, FieldError};

/// A catalog entry with a finite pool of physical copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CatalogItem {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    /// ISBN or other identifier, unique regardless of case
    pub identifier: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Copies currently out on loan
    pub fn borrowed_copies(&self) -> i32 {
        (self.total_copies - self.available_copies).max(0)
    }
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, message = "can't be blank"))]
    pub title: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub author: String,
    pub genre: Option<String>,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub identifier: String,
    #[validate(range(min = 0, message = "must be greater than or equal to 0"))]
    pub total_copies: i32,
    /// Defaults to `total_copies` when absent
    #[validate(range(min = 0, message = "must be greater than or equal to 0"))]
    pub available_copies: Option<i32>,
}

/// Partial update of an item; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub author: Option<String>,
    /// An empty string clears the genre
    pub genre: Option<String>,
    pub identifier: Option<String>,
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
}

/// Item fields after normalization and validation, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub identifier: String,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl CreateItem {
    /// Trim inputs, apply the available-copies default and run every field check.
    ///
    /// All failures are collected so the caller can report them at once.
    pub fn into_fields(mut self) -> AppResult<ItemFields> {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
        self.identifier = self.identifier.trim().to_string();
        self.genre = normalize_genre(self.genre);

        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(e) => match AppError::from(e) {
                AppError::Validation(fields) => fields,
                other => return Err(other),
            },
        };

        let available = self.available_copies.unwrap_or(self.total_copies);
        if self.total_copies >= 0 && available >= 0 && available > self.total_copies {
            errors.push(FieldError::new("available_copies", "cannot exceed total copies"));
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        Ok(ItemFields {
            title: self.title,
            author: self.author,
            genre: self.genre,
            identifier: self.identifier,
            total_copies: self.total_copies,
            available_copies: available,
        })
    }
}

impl UpdateItem {
    /// Merge the patch over the stored item.
    ///
    /// `available_copies` is taken verbatim from the patch or the stored item, never
    /// re-derived from `total_copies`.
    pub fn merge_onto(self, current: &CatalogItem) -> CreateItem {
        CreateItem {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            author: self.author.unwrap_or_else(|| current.author.clone()),
            genre: match self.genre {
                Some(genre) => Some(genre),
                None => current.genre.clone(),
            },
            identifier: self.identifier.unwrap_or_else(|| current.identifier.clone()),
            total_copies: self.total_copies.unwrap_or(current.total_copies),
            available_copies: Some(self.available_copies.unwrap_or(current.available_copies)),
        }
    }
}

fn normalize_genre(genre: Option<String>) -> Option<String> {
    genre
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
}

/// Catalog listing filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemFilter {
    /// At least one copy on the shelf
    Available,
    /// At least one copy out on loan
    Borrowed,
    /// At least one active loan due today
    DueToday,
}

/// Item query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ItemQuery {
    /// Case-insensitive text matched against title, author and genre
    pub search: Option<String>,
    pub filter: Option<ItemFilter>,
}
