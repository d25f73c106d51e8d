use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{
    errors::{AppError, Result},
    storage::{is_safe_name, resolve_name, BlobKind, BlobStore},
};

const URL_PREFIX: &str = "/uploads/";

/// Filesystem storage rooted at `base_path`, with one directory per [`BlobKind`].
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn get_full_path(&self, kind: BlobKind, name: &str) -> PathBuf {
        self.base_path.join(kind.as_str()).join(name)
    }

    fn locator(kind: BlobKind, name: &str) -> String {
        format!("{}{}/{}", URL_PREFIX, kind.as_str(), name)
    }

    fn parse_locator(locator: &str) -> Option<(BlobKind, &str)> {
        let rest = locator.strip_prefix(URL_PREFIX)?;
        let (kind, name) = rest.split_once('/')?;
        let kind = BlobKind::from_segment(kind)?;
        is_safe_name(name).then_some((kind, name))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn save(&self, kind: BlobKind, data: Vec<u8>, name: Option<&str>) -> Result<String> {
        let name = resolve_name(name)?;
        let full_path = self.get_full_path(kind, &name);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&full_path, data).await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {}", e)))?;

        Ok(Self::locator(kind, &name))
    }

    async fn get(&self, locator: &str) -> Result<Option<Vec<u8>>> {
        let Some((kind, name)) = Self::parse_locator(locator) else {
            return Ok(None);
        };

        match fs::read(self.get_full_path(kind, name)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read file: {}", e))),
        }
    }

    async fn remove(&self, locator: &str) -> Result<bool> {
        let Some((kind, name)) = Self::parse_locator(locator) else {
            return Ok(false);
        };

        match fs::remove_file(self.get_full_path(kind, name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_storage_operations() {
        let temp_dir = tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path()).unwrap();

        let test_data = b"\x89PNG fake bytes".to_vec();

        let locator = storage
            .save(BlobKind::Original, test_data.clone(), Some("a.png"))
            .await
            .unwrap();
        assert_eq!(locator, "/uploads/original/a.png");
        assert!(temp_dir.path().join("original").join("a.png").exists());

        let retrieved = storage.get(&locator).await.unwrap();
        assert_eq!(retrieved, Some(test_data));

        assert!(storage.remove(&locator).await.unwrap());
        assert!(!storage.remove(&locator).await.unwrap());
        assert_eq!(storage.get(&locator).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_directories_created_on_first_use() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("nested").join("uploads");
        let storage = LocalStorage::new(&root).unwrap();

        let locator = storage.save(BlobKind::Processed, vec![1, 2, 3], None).await.unwrap();
        assert!(locator.starts_with("/uploads/processed/"));
        assert!(root.join("processed").is_dir());
    }

    #[tokio::test]
    async fn test_rejects_foreign_and_traversal_locators() {
        let temp_dir = tempdir().unwrap();
        let storage = LocalStorage::new(temp_dir.path()).unwrap();

        assert_eq!(storage.get("/uploads/original/../secret").await.unwrap(), None);
        assert_eq!(storage.get("/uploads/thumbs/a.png").await.unwrap(), None);
        assert_eq!(storage.get("/api/images/original-a.png").await.unwrap(), None);
        assert!(!storage.remove("/etc/passwd").await.unwrap());
        assert!(storage.save(BlobKind::Original, vec![0], Some("../x")).await.is_err());
    }
}
