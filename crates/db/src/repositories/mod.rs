use async_trait::async_trait;
use thiserror::Error;

use smartscoop_core::domain::profile::{UserId, UserProfile};
use smartscoop_core::errors::ApplicationError;

pub mod memory;
pub mod profile;

pub use memory::InMemoryUserProfileRepository;
pub use profile::SqlUserProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Storage(value.to_string())
    }
}

/// Profile Store. A missing row is `Ok(None)`, never an error.
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
    /// Upsert by `user_id`; all three documents are overwritten.
    async fn save(&self, profile: UserProfile) -> Result<(), RepositoryError>;
}
