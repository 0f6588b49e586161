//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod members;
pub mod queries;

use crate::{config::CirculationConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
    pub members: members::MembersService,
    pub queries: queries::QueryService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &CirculationConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                config.loan_period(),
            ),
            members: members::MembersService::new(repository.clone()),
            queries: queries::QueryService::new(repository),
        }
    }
}
