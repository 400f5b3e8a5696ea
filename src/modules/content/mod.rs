//! Opaque blob storage for uploaded file bodies.
//!
//! Every blob is addressed by a [`ContentHandle`] minted by the store on `put`.
//! A handle is owned by exactly one file record; nothing deduplicates blobs.

pub mod disk;
pub mod memory;
pub mod pg;

pub use disk::DiskContentStore;
pub use memory::MemoryContentStore;
pub use pg::PgContentStore;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ContentHandle(Uuid);

impl ContentHandle {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Content not found: {0}")]
    NotFound(ContentHandle),
    #[error("Content store unavailable: {0}")]
    Unavailable(String),
    #[error("Content store quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Content IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Content database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ContentResult<T> = Result<T, ContentError>;

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` under a fresh handle.
    async fn put(&self, bytes: Vec<u8>) -> ContentResult<ContentHandle>;

    /// Whole-blob read. Missing blobs are `ContentError::NotFound`.
    async fn get(&self, handle: &ContentHandle) -> ContentResult<Vec<u8>>;

    /// Returns `false` when nothing was stored under `handle`.
    async fn delete(&self, handle: &ContentHandle) -> ContentResult<bool>;

    /// Connectivity check used by `/health`.
    async fn ping(&self) -> ContentResult<()>;
}
