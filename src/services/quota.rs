use std::sync::Arc;

use crate::{
    database::{RecordOutcome, Repository},
    errors::{AppError, Result},
    models::{Image, NewImage, SubscriptionPlan, User, FREE_PLAN_LIMIT, PREMIUM_PLAN_LIMIT},
};

pub fn remaining(user: &User) -> Option<i32> {
    user.subscription_plan
        .processing_limit()
        .map(|c| (c - user.processing_count).max(0))
}

fn limit_message(plan: SubscriptionPlan) -> String {
    match plan {
        SubscriptionPlan::Free => format!(
            "You've reached your limit of {} free images. Please upgrade to a premium plan.",
            FREE_PLAN_LIMIT
        ),
        SubscriptionPlan::Premium => format!(
            "You've reached your limit of {} images. Please upgrade to the Business plan for unlimited processing.",
            PREMIUM_PLAN_LIMIT
        ),
        SubscriptionPlan::Business => "Processing limit reached".to_string(),
    }
}

/// Per-plan usage gate for authenticated users.
#[derive(Clone)]
pub struct QuotaGate {
    repository: Arc<dyn Repository>,
}

impl QuotaGate {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Read-only pre-check, done before any external call or storage write.
    pub async fn check(&self, user_id: i32) -> Result<User> {
        let user = self
            .repository
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if let Some(ceiling) = user.subscription_plan.processing_limit() {
            if user.processing_count >= ceiling {
                tracing::info!(
                    user_id,
                    plan = %user.subscription_plan,
                    count = user.processing_count,
                    "Processing rejected, plan limit reached"
                );
                return Err(AppError::QuotaExceeded(limit_message(user.subscription_plan)));
            }
        }

        Ok(user)
    }

    /// Consumes one unit of quota and stores the image record in one atomic
    /// repository call. The ceiling is read from the stored plan at that
    /// moment, so a concurrent request taking the last unit or a downgrade
    /// since [`QuotaGate::check`] both end in `QuotaExceeded`.
    pub async fn commit(&self, user: &User, image: NewImage) -> Result<(User, Image)> {
        match self.repository.record_processing(user.id, image).await? {
            RecordOutcome::Recorded { user, image } => Ok((user, image)),
            RecordOutcome::LimitReached { user } => {
                tracing::warn!(user_id = user.id, "Concurrent request exhausted the plan limit");
                Err(AppError::QuotaExceeded(limit_message(user.subscription_plan)))
            }
        }
    }
}
