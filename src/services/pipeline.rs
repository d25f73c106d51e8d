use image::ImageFormat;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::Config,
    database::Repository,
    errors::{AppError, Result},
    models::{NewImage, ProcessingResponse},
    services::{
        anonymous_usage::AnonymousUsage, background_remover::BackgroundRemover, quota::QuotaGate,
    },
    storage::{BlobKind, BlobStore},
    utils::file,
};

/// An uploaded file as it came off the multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User(i32),
    /// Keyed by client address.
    Anonymous(String),
}

/// Validation, quota, background removal, storage and persistence for one
/// upload, in that order.
pub struct ProcessingPipeline {
    max_file_size: usize,
    allowed_mime_types: Vec<String>,
    repository: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStore>,
    remover: BackgroundRemover,
    quota: QuotaGate,
    anonymous: AnonymousUsage,
}

impl ProcessingPipeline {
    pub fn new(
        config: &Config,
        repository: Arc<dyn Repository>,
        blobs: Arc<dyn BlobStore>,
        remover: BackgroundRemover,
    ) -> Self {
        Self {
            max_file_size: config.max_file_size,
            allowed_mime_types: config.allowed_mime_types.clone(),
            quota: QuotaGate::new(repository.clone()),
            anonymous: AnonymousUsage::new(
                config.anonymous_limit,
                std::time::Duration::from_secs(config.anonymous_window_secs),
            ),
            repository,
            blobs,
            remover,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn has_api_key(&self) -> bool {
        self.remover.has_api_key()
    }

    pub fn validate(&self, upload: &Upload) -> Result<ImageFormat> {
        if upload.data.is_empty() {
            return Err(AppError::Validation("No image file uploaded".to_string()));
        }
        if upload.data.len() > self.max_file_size {
            return Err(AppError::Validation(format!(
                "File too large, the limit is {} bytes",
                self.max_file_size
            )));
        }
        file::validate_mime_type(&upload.content_type, &self.allowed_mime_types)?;
        file::validate_image_signature(&upload.data, &upload.content_type)
    }

    pub async fn process(&self, caller: &Caller, upload: Upload) -> Result<ProcessingResponse> {
        let format = self.validate(&upload)?;

        match caller {
            Caller::User(user_id) => {
                let user = self.quota.check(*user_id).await?;
                let stored = self.remove_and_store(upload.data, format).await?;

                let image = stored.new_image(Some(user.id));
                match self.quota.commit(&user, image).await {
                    Ok((user, image)) => {
                        tracing::info!(
                            user_id = user.id,
                            image_id = image.id,
                            count = user.processing_count,
                            "Image processed"
                        );
                        Ok(ProcessingResponse {
                            id: Some(image.id),
                            original_url: image.original_url,
                            processed_url: image.processed_url,
                            method: stored.method,
                            processing_count: Some(user.processing_count),
                        })
                    }
                    Err(e) => {
                        self.discard(&stored).await;
                        Err(e)
                    }
                }
            }
            Caller::Anonymous(client) => {
                if !self.anonymous.enabled() {
                    return Err(AppError::Auth("Authentication required".to_string()));
                }
                if !self.anonymous.try_acquire(client) {
                    return Err(AppError::QuotaExceeded(
                        "You've used your free images. Please sign up to keep processing.".to_string(),
                    ));
                }

                let result = self.process_anonymous(upload.data, format).await;
                if result.is_err() {
                    self.anonymous.release(client);
                }
                result
            }
        }
    }

    async fn process_anonymous(&self, data: Vec<u8>, format: ImageFormat) -> Result<ProcessingResponse> {
        let stored = self.remove_and_store(data, format).await?;

        match self.repository.save_image(stored.new_image(None)).await {
            Ok(image) => {
                tracing::info!(image_id = image.id, "Anonymous image processed");
                Ok(ProcessingResponse {
                    id: Some(image.id),
                    original_url: image.original_url,
                    processed_url: image.processed_url,
                    method: stored.method,
                    processing_count: None,
                })
            }
            Err(e) => {
                self.discard(&stored).await;
                Err(e)
            }
        }
    }

    async fn remove_and_store(&self, data: Vec<u8>, format: ImageFormat) -> Result<StoredPair> {
        let removal = self.remover.remove_background(data.clone()).await?;

        let id = Uuid::new_v4();
        let original_name = format!("{}.{}", id, file::get_file_extension(format));
        let processed_name = format!("{}.png", id);

        let original_url = self
            .blobs
            .save(BlobKind::Original, data, Some(&original_name))
            .await?;

        let processed_url = match self
            .blobs
            .save(BlobKind::Processed, removal.data, Some(&processed_name))
            .await
        {
            Ok(locator) => locator,
            Err(e) => {
                self.remove_blob(&original_url).await;
                return Err(e);
            }
        };

        Ok(StoredPair {
            original_url,
            processed_url,
            method: removal.method,
        })
    }

    /// Compensating delete for blobs whose record was never written.
    async fn discard(&self, stored: &StoredPair) {
        self.remove_blob(&stored.original_url).await;
        self.remove_blob(&stored.processed_url).await;
    }

    async fn remove_blob(&self, locator: &str) {
        if let Err(e) = self.blobs.remove(locator).await {
            tracing::error!("Failed to remove orphaned blob {}: {}", locator, e);
        }
    }
}

struct StoredPair {
    original_url: String,
    processed_url: String,
    method: crate::models::RemovalMethod,
}

impl StoredPair {
    fn new_image(&self, user_id: Option<i32>) -> NewImage {
        NewImage {
            user_id,
            original_url: self.original_url.clone(),
            processed_url: self.processed_url.clone(),
        }
    }
}
