use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::errors::{AppError, Result};

pub mod local;
pub mod memory;

/// Which side of a processing run a blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Original,
    Processed,
}

impl BlobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKind::Original => "original",
            BlobKind::Processed => "processed",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "original" => Some(BlobKind::Original),
            "processed" => Some(BlobKind::Processed),
            _ => None,
        }
    }
}

/// Byte storage for original and processed images.
///
/// A locator returned by `save` is also the public URL path the blob is served
/// from, so it can be stored on an image record as-is.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, kind: BlobKind, data: Vec<u8>, name: Option<&str>) -> Result<String>;

    /// Returns `None` for locators this backend never issued or no longer holds.
    async fn get(&self, locator: &str) -> Result<Option<Vec<u8>>>;

    async fn remove(&self, locator: &str) -> Result<bool>;
}

pub fn create_storage(config: &Config) -> Result<Arc<dyn BlobStore>> {
    match config.storage_backend {
        StorageBackend::Local => {
            let storage = local::LocalStorage::new(&config.upload_dir)?;
            tracing::info!("Using filesystem blob storage at {}", config.upload_dir);
            Ok(Arc::new(storage))
        }
        StorageBackend::Memory => {
            tracing::info!("Using in-memory blob storage");
            Ok(Arc::new(memory::MemoryStorage::new()))
        }
    }
}

pub(crate) fn resolve_name(name: Option<&str>) -> Result<String> {
    match name {
        Some(name) if is_safe_name(name) => Ok(name.to_string()),
        Some(name) => Err(AppError::Storage(format!("Invalid blob name: {:?}", name))),
        None => Ok(format!("{}.png", Uuid::new_v4())),
    }
}

pub(crate) fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_names() {
        assert!(is_safe_name("3f1c.png"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("../etc/passwd"));
        assert!(!is_safe_name("a/b.png"));
        assert!(!is_safe_name("a\\b.png"));

        let generated = resolve_name(None).unwrap();
        assert!(generated.ends_with(".png"));
        assert!(resolve_name(Some("..")).is_err());
    }

    #[test]
    fn test_kind_segments() {
        assert_eq!(BlobKind::from_segment("original"), Some(BlobKind::Original));
        assert_eq!(BlobKind::from_segment("processed"), Some(BlobKind::Processed));
        assert_eq!(BlobKind::from_segment("thumbs"), None);
    }
}
