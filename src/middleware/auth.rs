use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    errors::AppError, handlers::AppState, middleware::client_ip::ClientAddress, services::Caller,
};

/// Identity carried by a valid bearer token. The user row itself is loaded by
/// the handler, so a deleted user surfaces as 404 rather than 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
}

/// Like [`AuthenticatedUser`] but absent when no `Authorization` header was
/// sent. A header with a bad token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

fn bearer_token(headers: &HeaderMap) -> Option<Result<&str, AppError>> {
    let value = headers.get(header::AUTHORIZATION)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth("Malformed authorization header".to_string()));
    Some(token)
}

fn verify(state: &AppState, token: &str) -> Result<AuthenticatedUser, AppError> {
    let claims = state
        .jwt
        .verify_token(token)
        .map_err(|_| AppError::Auth("Invalid or expired token".to_string()))?;

    Ok(AuthenticatedUser {
        id: claims.user_id()?,
        username: claims.username,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => verify(state, token?),
            None => Err(AppError::Auth("Authentication required".to_string())),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => Ok(MaybeUser(Some(verify(state, token?)?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

impl MaybeUser {
    pub fn caller(&self, client: &ClientAddress) -> Caller {
        match &self.0 {
            Some(user) => Caller::User(user.id),
            None => Caller::Anonymous(client.0.clone()),
        }
    }
}
