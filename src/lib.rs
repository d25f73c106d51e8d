use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use handlers::AppState;

/// Room for multipart boundaries and headers around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    let processing_routes = Router::new()
        .route("/api/remove-background", post(handlers::images::remove_background))
        .layer(DefaultBodyLimit::max(body_limit));

    let api_routes = Router::new()
        // Auth
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout))
        // User
        .route("/api/user", get(handlers::user::current_user))
        .route("/api/user-images", get(handlers::images::user_images))
        .route("/api/update-subscription", post(handlers::user::update_subscription))
        // Images
        .route("/api/image/:id", get(handlers::images::get_image))
        .route("/api/images/:id", get(handlers::images::serve_memory_blob))
        .route("/uploads/:kind/:name", get(handlers::images::serve_upload));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness));

    Router::new()
        .merge(processing_routes)
        .merge(api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
