use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    database::{RecordOutcome, Repository},
    errors::{AppError, Result},
    models::{
        Image, NewImage, NewUser, SubscriptionPlan, User, UserUpdate, FREE_PLAN_LIMIT,
        PREMIUM_PLAN_LIMIT,
    },
};

const USER_COLUMNS: &str =
    "id, username, password, email, subscription_plan, processing_count, free_trial_used";
const IMAGE_COLUMNS: &str = "id, user_id, original_url, processed_url, created_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i32,
    username: String,
    password: String,
    email: Option<String>,
    subscription_plan: String,
    processing_count: i32,
    free_trial_used: bool,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        let subscription_plan: SubscriptionPlan = row
            .subscription_plan
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;

        Ok(User {
            id: row.id,
            username: row.username,
            password: row.password,
            email: row.email,
            subscription_plan,
            processing_count: row.processing_count,
            free_trial_used: row.free_trial_used,
        })
    }
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Migration failed: {}", e)))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_user<'e, E>(executor: E, id: i32) -> Result<Option<User>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        row.map(User::try_from).transpose()
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23505")
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        Self::fetch_user(&self.pool, id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, password, email, subscription_plan, processing_count, free_trial_used)
            VALUES ($1, $2, $3, 'free', 0, FALSE)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.try_into(),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "Username {} is already taken",
                user.username
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_user(&self, id: i32, update: UserUpdate) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                email = CASE WHEN $2 THEN $3 ELSE email END,
                password = COALESCE($4, password),
                subscription_plan = COALESCE($5, subscription_plan),
                free_trial_used = COALESCE($6, free_trial_used)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(update.email.is_some())
        .bind(update.email.clone().flatten())
        .bind(&update.password)
        .bind(update.subscription_plan.map(|p| p.as_str()))
        .bind(update.free_trial_used)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("User".to_string()))?
            .try_into()
    }

    async fn increment_processing_count(&self, id: i32) -> Result<()> {
        let result = sqlx::query("UPDATE users SET processing_count = processing_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn record_processing(&self, user_id: i32, image: NewImage) -> Result<RecordOutcome> {
        let mut tx = self.pool.begin().await?;

        // The plan lookup, ceiling check and increment are a single statement,
        // so neither a concurrent request nor a plan change can slip past it.
        let updated = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                processing_count = processing_count + 1,
                free_trial_used = free_trial_used
                    OR (subscription_plan = 'free' AND processing_count + 1 >= $2)
            WHERE id = $1
              AND (subscription_plan NOT IN ('free', 'premium')
                   OR processing_count < CASE subscription_plan WHEN 'free' THEN $2 ELSE $3 END)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(FREE_PLAN_LIMIT)
        .bind(PREMIUM_PLAN_LIMIT)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let user = Self::fetch_user(&mut *tx, user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("User".to_string()))?;
            tx.rollback().await?;
            return Ok(RecordOutcome::LimitReached { user });
        };

        let image = sqlx::query_as::<_, Image>(&format!(
            r#"
            INSERT INTO images (user_id, original_url, processed_url)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        ))
        .bind(image.user_id)
        .bind(&image.original_url)
        .bind(&image.processed_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RecordOutcome::Recorded {
            user: row.try_into()?,
            image,
        })
    }

    async fn save_image(&self, image: NewImage) -> Result<Image> {
        let image = sqlx::query_as::<_, Image>(&format!(
            r#"
            INSERT INTO images (user_id, original_url, processed_url)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        ))
        .bind(image.user_id)
        .bind(&image.original_url)
        .bind(&image.processed_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(image)
    }

    async fn get_user_images(&self, user_id: i32) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            IMAGE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn get_image(&self, id: i32) -> Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(&format!(
            "SELECT {} FROM images WHERE id = $1",
            IMAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(image)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
