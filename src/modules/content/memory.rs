use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::modules::content::{ContentError, ContentHandle, ContentResult, ContentStore};

/// In-process blob store for `memory://` deployments and tests.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<ContentHandle, Vec<u8>>>,
    capacity_bytes: Option<usize>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse `put` once the stored total would exceed `capacity_bytes`.
    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self { blobs: RwLock::default(), capacity_bytes: Some(capacity_bytes) }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn contains(&self, handle: &ContentHandle) -> bool {
        self.blobs.read().await.contains_key(handle)
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> ContentResult<ContentHandle> {
        let mut blobs = self.blobs.write().await;

        if let Some(capacity) = self.capacity_bytes {
            let used: usize = blobs.values().map(Vec::len).sum();
            if used + bytes.len() > capacity {
                return Err(ContentError::QuotaExceeded(format!(
                    "{} bytes requested, {} of {} bytes in use",
                    bytes.len(),
                    used,
                    capacity
                )));
            }
        }

        let handle = ContentHandle::generate();
        blobs.insert(handle, bytes);
        Ok(handle)
    }

    async fn get(&self, handle: &ContentHandle) -> ContentResult<Vec<u8>> {
        self.blobs.read().await.get(handle).cloned().ok_or(ContentError::NotFound(*handle))
    }

    async fn delete(&self, handle: &ContentHandle) -> ContentResult<bool> {
        Ok(self.blobs.write().await.remove(handle).is_some())
    }

    async fn ping(&self) -> ContentResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryContentStore::new();
        let handle = store.put(b"hello".to_vec()).await.unwrap();

        assert_eq!(store.get(&handle).await.unwrap(), b"hello");
        assert!(store.delete(&handle).await.unwrap());
        assert!(!store.delete(&handle).await.unwrap());
        assert!(matches!(store.get(&handle).await, Err(ContentError::NotFound(h)) if h == handle));
    }

    #[tokio::test]
    async fn test_handles_are_never_reused() {
        let store = MemoryContentStore::new();
        let a = store.put(b"same".to_vec()).await.unwrap();
        let b = store.put(b"same".to_vec()).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let store = MemoryContentStore::with_capacity_bytes(8);
        store.put(vec![0u8; 6]).await.unwrap();

        let err = store.put(vec![0u8; 3]).await.unwrap_err();
        assert!(matches!(err, ContentError::QuotaExceeded(_)));
        assert_eq!(store.len().await, 1);
    }
}
