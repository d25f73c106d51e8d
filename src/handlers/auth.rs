use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{
    auth::PasswordService,
    errors::{AppError, Result},
    handlers::AppState,
    models::{AuthResponse, CreateUserRequest, LoginRequest, NewUser},
};

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let username = request.username.trim().to_string();
    PasswordService::validate_username(&username)?;
    PasswordService::validate_password_strength(&request.password)?;

    let email = request
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }
    }

    if state.repository.get_user_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let password = state.passwords.hash_password(&request.password)?;
    let user = state
        .repository
        .create_user(NewUser { username, password, email })
        .await?;

    tracing::info!(user_id = user.id, "User registered");
    let token = state.jwt.generate_token(user.id, &user.username)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let invalid = || AppError::Auth("Invalid username or password".to_string());

    let user = state
        .repository
        .get_user_by_username(request.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !state.passwords.verify_password(&request.password, &user.password)? {
        return Err(invalid());
    }

    let token = state.jwt.generate_token(user.id, &user.username)?;
    Ok(Json(AuthResponse { token, user }))
}

/// Tokens are stateless; clients drop theirs.
pub async fn logout() -> Json<serde_json::Value> {
    Json(json!({ "message": "Logged out successfully" }))
}
