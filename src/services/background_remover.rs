use reqwest::{multipart, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::{
    config::Config,
    errors::{AppError, Result},
    models::RemovalMethod,
    services::mask,
};

/// Why the external removal call did not produce an image.
#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("no API key configured")]
    NotConfigured,

    #[error("API key rejected with HTTP {0}")]
    InvalidApiKey(StatusCode),

    #[error("API usage limit reached")]
    QuotaExhausted,

    #[error("API rate limit reached")]
    RateLimited,

    #[error("API error: HTTP {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned an empty image")]
    EmptyResponse,
}

impl RemovalError {
    /// Errors an operator has to fix, as opposed to ones that go away on their own.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, RemovalError::InvalidApiKey(_))
            || matches!(self, RemovalError::Api { status, .. } if status.is_client_error())
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::PAYMENT_REQUIRED => RemovalError::QuotaExhausted,
            StatusCode::TOO_MANY_REQUESTS => RemovalError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemovalError::InvalidApiKey(status),
            _ => RemovalError::Api { status, body },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemovalOutput {
    pub data: Vec<u8>,
    pub method: RemovalMethod,
}

/// Client for the remove.bg style HTTP API with a local mask fallback.
pub struct BackgroundRemover {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl BackgroundRemover {
    pub fn new(api_key: Option<String>, api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.remove_bg_api_key.clone(),
            config.remove_bg_api_url.clone(),
            Duration::from_secs(config.remove_bg_timeout_secs),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// One attempt against the external API. No retries.
    pub async fn call_api(&self, data: &[u8]) -> std::result::Result<Vec<u8>, RemovalError> {
        let api_key = self.api_key.as_deref().ok_or(RemovalError::NotConfigured)?;

        let form = multipart::Form::new()
            .part(
                "image_file",
                multipart::Part::bytes(data.to_vec()).file_name("image.png"),
            )
            .text("size", "auto")
            .text("format", "png")
            .text("bg_color", "");

        tracing::debug!("Sending {} bytes to background removal API", data.len());
        let response = self
            .client
            .post(&self.api_url)
            .header("X-Api-Key", api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemovalError::from_status(status, body));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(RemovalError::EmptyResponse);
        }
        Ok(bytes.to_vec())
    }

    /// Tries the API first and falls back to the circular mask on any failure.
    /// Only errors when the fallback itself cannot process the image.
    pub async fn remove_background(&self, data: Vec<u8>) -> Result<RemovalOutput> {
        match self.call_api(&data).await {
            Ok(processed) => {
                tracing::info!("Background removed via API ({} bytes)", processed.len());
                return Ok(RemovalOutput {
                    data: processed,
                    method: RemovalMethod::Api,
                });
            }
            Err(RemovalError::NotConfigured) => {
                tracing::debug!("No background removal API key, using fallback mask");
            }
            Err(e) if e.is_configuration_error() => {
                tracing::error!("Background removal API misconfigured, using fallback mask: {}", e);
            }
            Err(e) => {
                tracing::warn!("Background removal API unavailable, using fallback mask: {}", e);
            }
        }

        let processed = tokio::task::spawn_blocking(move || mask::apply_fallback_mask(&data))
            .await
            .map_err(|e| AppError::Processing(format!("Fallback task failed: {}", e)))?
            .map_err(|e| AppError::Processing(format!("Fallback background removal failed: {}", e)))?;

        Ok(RemovalOutput {
            data: processed,
            method: RemovalMethod::Fallback,
        })
    }
}
