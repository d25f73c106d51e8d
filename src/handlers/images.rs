use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::{AuthenticatedUser, ClientAddress, MaybeUser},
    models::{Image, ProcessingResponse},
    services::Upload,
    storage::BlobKind,
    utils::file,
};

const IMAGE_FIELD: &str = "image";

pub async fn remove_background(
    State(state): State<AppState>,
    user: MaybeUser,
    client: ClientAddress,
    mut multipart: Multipart,
) -> Result<Json<ProcessingResponse>> {
    let upload = read_upload(&mut multipart, state.pipeline.max_file_size()).await?;
    let caller = user.caller(&client);

    let response = state.pipeline.process(&caller, upload).await?;
    Ok(Json(response))
}

async fn read_upload(multipart: &mut Multipart, max_file_size: usize) -> Result<Upload> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        AppError::Validation(format!("Failed to parse multipart data: {}", e))
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            AppError::Validation(format!("Failed to read file data: {}", e))
        })? {
            if data.len() + chunk.len() > max_file_size {
                return Err(AppError::Validation(format!(
                    "File too large, the limit is {} bytes",
                    max_file_size
                )));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(Upload { data, content_type });
    }

    Err(AppError::Validation("No image file uploaded".to_string()))
}

/// Filesystem blobs, `/uploads/{original|processed}/<name>`.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Response> {
    if BlobKind::from_segment(&kind).is_none() {
        return Err(AppError::NotFound("File".to_string()));
    }
    serve_blob(&state, &format!("/uploads/{}/{}", kind, name)).await
}

/// In-memory blobs, `/api/images/<kind>-<name>`.
pub async fn serve_memory_blob(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    serve_blob(&state, &format!("/api/images/{}", id)).await
}

async fn serve_blob(state: &AppState, locator: &str) -> Result<Response> {
    let data = state
        .blobs
        .get(locator)
        .await?
        .ok_or_else(|| AppError::NotFound("File".to_string()))?;

    let content_type = file::content_type_for(&data);
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        data,
    )
        .into_response())
}

pub async fn get_image(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(image_id): Path<i32>,
) -> Result<Json<Image>> {
    let image = state
        .repository
        .get_image(image_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image".to_string()))?;

    if image.user_id != Some(auth.id) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(image))
}

pub async fn user_images(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<Vec<Image>>> {
    let images = state.repository.get_user_images(auth.id).await?;
    Ok(Json(images))
}
