use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, DatabaseBackend};
use crate::errors::Result;
use crate::models::{Image, NewImage, NewUser, User, UserUpdate};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Result of [`Repository::record_processing`].
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded { user: User, image: Image },
    /// The counter was already at the ceiling; nothing was written.
    LimitReached { user: User },
}

/// User and image records. Both implementations must behave identically.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user(&self, id: i32) -> Result<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// New users start on the free plan with a zero counter and an unused trial.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn update_user(&self, id: i32, update: UserUpdate) -> Result<User>;

    async fn increment_processing_count(&self, id: i32) -> Result<()>;

    /// Increments the user's counter if it is below the ceiling of the plan
    /// stored on the row at that moment, and stores `image`, as one atomic
    /// step. A free-plan user whose counter reaches the ceiling gets
    /// `free_trial_used` set.
    async fn record_processing(&self, user_id: i32, image: NewImage) -> Result<RecordOutcome>;

    async fn save_image(&self, image: NewImage) -> Result<Image>;

    /// Newest first.
    async fn get_user_images(&self, user_id: i32) -> Result<Vec<Image>>;

    async fn get_image(&self, id: i32) -> Result<Option<Image>>;

    async fn ping(&self) -> Result<()>;
}

pub async fn create_repository(config: &Config) -> Result<Arc<dyn Repository>> {
    match config.database_backend {
        DatabaseBackend::Memory => {
            tracing::info!("Using in-memory user and image records");
            Ok(Arc::new(MemoryRepository::new()))
        }
        DatabaseBackend::Postgres => {
            let repository = PgRepository::new(&config.database_url).await?;
            repository.migrate().await?;
            tracing::info!("Connected to PostgreSQL");
            Ok(Arc::new(repository))
        }
    }
}
