use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::{
    database::{RecordOutcome, Repository},
    errors::{AppError, Result},
    models::{Image, NewImage, NewUser, SubscriptionPlan, User, UserUpdate},
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    images: BTreeMap<i32, Image>,
    next_user_id: i32,
    next_image_id: i32,
}

impl Tables {
    fn insert_image(&mut self, image: NewImage) -> Image {
        self.next_image_id += 1;
        let image = Image {
            id: self.next_image_id,
            user_id: image.user_id,
            original_url: image.original_url,
            processed_url: image.processed_url,
            created_at: Utc::now(),
        };
        self.images.insert(image.id, image.clone());
        image
    }
}

/// Map-backed repository for development and tests. Ids start at 1.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!("Username {} is already taken", user.username)));
        }

        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            username: user.username,
            password: user.password,
            email: user.email,
            subscription_plan: SubscriptionPlan::Free,
            processing_count: 0,
            free_trial_used: false,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i32, update: UserUpdate) -> Result<User> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        update.apply(user);
        Ok(user.clone())
    }

    async fn increment_processing_count(&self, id: i32) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        user.processing_count += 1;
        Ok(())
    }

    async fn record_processing(&self, user_id: i32, image: NewImage) -> Result<RecordOutcome> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let ceiling = user.subscription_plan.processing_limit();
        if let Some(ceiling) = ceiling {
            if user.processing_count >= ceiling {
                return Ok(RecordOutcome::LimitReached { user: user.clone() });
            }
        }

        user.processing_count += 1;
        if user.subscription_plan == SubscriptionPlan::Free
            && ceiling.is_some_and(|c| user.processing_count >= c)
        {
            user.free_trial_used = true;
        }
        let user = user.clone();
        let image = tables.insert_image(image);

        Ok(RecordOutcome::Recorded { user, image })
    }

    async fn save_image(&self, image: NewImage) -> Result<Image> {
        Ok(self.tables.lock().await.insert_image(image))
    }

    async fn get_user_images(&self, user_id: i32) -> Result<Vec<Image>> {
        let tables = self.tables.lock().await;
        let mut images: Vec<Image> = tables
            .images
            .values()
            .filter(|image| image.user_id == Some(user_id))
            .cloned()
            .collect();
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(images)
    }

    async fn get_image(&self, id: i32) -> Result<Option<Image>> {
        Ok(self.tables.lock().await.images.get(&id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
