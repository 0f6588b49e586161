//! Borrower directory service

use validator::Validate;

use crate::{
    error::AppResult,
    models::member::{Borrower, CreateBorrower},
    repository::Repository,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_members(&self) -> AppResult<Vec<Borrower>> {
        self.repository.borrowers.list().await
    }

    /// Register a borrower known to the identity subsystem
    pub async fn register(&self, mut borrower: CreateBorrower) -> AppResult<Borrower> {
        borrower.name = borrower.name.trim().to_string();
        borrower.email = borrower.email.trim().to_string();
        borrower.validate()?;

        let created = self.repository.borrowers.register(&borrower).await?;
        tracing::info!("Registered {} id={}", created.role, created.id);
        Ok(created)
    }
}
