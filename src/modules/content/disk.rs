use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::modules::content::{ContentError, ContentHandle, ContentResult, ContentStore};

/// Blobs as plain files under `root`, sharded by the first two hex digits
/// of the handle: `{root}/{ab}/{abcdef...}`.
#[derive(Clone)]
pub struct DiskContentStore {
    root: PathBuf,
}

impl DiskContentStore {
    pub async fn new(root: impl Into<PathBuf>) -> ContentResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            ContentError::Unavailable(format!(
                "Failed to create content directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, handle: &ContentHandle) -> PathBuf {
        // Handles render as 32 hex digits, so the name can't escape `root`.
        let name = handle.to_string();
        self.root.join(&name[..2]).join(name)
    }
}

fn map_io(err: std::io::Error, handle: &ContentHandle) -> ContentError {
    match err.kind() {
        ErrorKind::NotFound => ContentError::NotFound(*handle),
        ErrorKind::StorageFull => ContentError::QuotaExceeded(err.to_string()),
        _ => ContentError::Io(err),
    }
}

#[async_trait::async_trait]
impl ContentStore for DiskContentStore {
    async fn put(&self, bytes: Vec<u8>) -> ContentResult<ContentHandle> {
        let handle = ContentHandle::generate();
        let path = self.blob_path(&handle);
        let tmp = path.with_extension("part");

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| map_io(e, &handle))?;
        }

        // Write then rename so readers never observe a half-written blob.
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(map_io(e, &handle));
        }
        tokio::fs::rename(&tmp, &path).await.map_err(|e| map_io(e, &handle))?;

        Ok(handle)
    }

    async fn get(&self, handle: &ContentHandle) -> ContentResult<Vec<u8>> {
        tokio::fs::read(self.blob_path(handle)).await.map_err(|e| map_io(e, handle))
    }

    async fn delete(&self, handle: &ContentHandle) -> ContentResult<bool> {
        match tokio::fs::remove_file(self.blob_path(handle)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io(e, handle)),
        }
    }

    async fn ping(&self) -> ContentResult<()> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| ContentError::Unavailable(format!("{}: {}", self.root.display(), e)))?;
        if !meta.is_dir() {
            return Err(ContentError::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}
