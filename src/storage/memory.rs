use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    errors::Result,
    storage::{resolve_name, BlobKind, BlobStore},
};

const URL_PREFIX: &str = "/api/images/";

/// Process-local blob map for read-only deployments.
///
/// Nothing is ever evicted: memory grows with every stored image and all blobs
/// are lost on restart, leaving image records pointing at nothing.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn key(locator: &str) -> Option<&str> {
        locator.strip_prefix(URL_PREFIX).filter(|id| !id.is_empty())
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn save(&self, kind: BlobKind, data: Vec<u8>, name: Option<&str>) -> Result<String> {
        let id = format!("{}-{}", kind.as_str(), resolve_name(name)?);
        self.blobs.write().await.insert(id.clone(), data);
        Ok(format!("{}{}", URL_PREFIX, id))
    }

    async fn get(&self, locator: &str) -> Result<Option<Vec<u8>>> {
        let Some(id) = Self::key(locator) else {
            return Ok(None);
        };
        Ok(self.blobs.read().await.get(id).cloned())
    }

    async fn remove(&self, locator: &str) -> Result<bool> {
        let Some(id) = Self::key(locator) else {
            return Ok(false);
        };
        Ok(self.blobs.write().await.remove(id).is_some())
    }
}
