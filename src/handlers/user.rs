use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::auth::AuthenticatedUser,
    models::{SubscriptionPlan, UpdateSubscriptionRequest, User, UserUpdate},
    services::quota,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    /// `None` on unlimited plans.
    pub remaining_images: Option<i32>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            remaining_images: quota::remaining(&user),
            user,
        }
    }
}

pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<UserResponse>> {
    let user = state
        .repository
        .get_user(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(Json(user.into()))
}

pub async fn update_subscription(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> Result<Json<UserResponse>> {
    let plan: SubscriptionPlan = request.plan.parse().map_err(AppError::Validation)?;

    let user = state.repository.update_user(auth.id, UserUpdate::plan(plan)).await?;
    tracing::info!(user_id = user.id, plan = %plan, "Subscription updated");

    Ok(Json(user.into()))
}
