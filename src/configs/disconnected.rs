use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use uuid::Uuid;

use crate::api::error;
use crate::configs::StorageStatus;
use crate::modules::content::{ContentError, ContentHandle, ContentResult, ContentStore};
use crate::modules::file::{
    model::NewFile,
    repository::{ExpiryCursor, FileRepository},
    schema::FileEntity,
};

/// Stand-in for both stores when storage is not configured or unreachable at
/// start-up. Every call fails, so the HTTP layer can still report why.
pub struct DisconnectedStore {
    status: StorageStatus,
}

impl DisconnectedStore {
    pub fn new(status: StorageStatus) -> Self {
        Self { status }
    }

    fn error(&self) -> error::SystemError {
        match &self.status {
            StorageStatus::NotConfigured(reason) => error::SystemError::NotConfigured(reason.clone().into()),
            StorageStatus::Unreachable(reason) => error::SystemError::storage_unavailable(reason.clone()),
            StorageStatus::Connected => error::SystemError::storage_unavailable("storage disconnected"),
        }
    }

    fn content_error(&self) -> ContentError {
        ContentError::Unavailable(self.status.to_string())
    }
}

#[async_trait::async_trait]
impl FileRepository for DisconnectedStore {
    async fn insert(&self, _file: &NewFile) -> Result<FileEntity, error::SystemError> {
        Err(self.error())
    }

    async fn find_by_code(
        &self,
        _code: &str,
        _extension: Option<&str>,
    ) -> Result<Option<FileEntity>, error::SystemError> {
        Err(self.error())
    }

    async fn find_by_id(&self, _file_id: &Uuid) -> Result<Option<FileEntity>, error::SystemError> {
        Err(self.error())
    }

    fn list(
        &self,
        _before: Option<DateTime<Utc>>,
        _limit: i64,
    ) -> BoxStream<'_, Result<FileEntity, error::SystemError>> {
        stream::once(futures_util::future::ready(Err(self.error()))).boxed()
    }

    async fn find_expired(
        &self,
        _cutoff: DateTime<Utc>,
        _after: Option<ExpiryCursor>,
        _limit: i64,
    ) -> Result<Vec<FileEntity>, error::SystemError> {
        Err(self.error())
    }

    async fn delete_by_id(&self, _file_id: &Uuid) -> Result<bool, error::SystemError> {
        Err(self.error())
    }

    async fn delete_expired(&self, _cutoff: DateTime<Utc>) -> Result<u64, error::SystemError> {
        Err(self.error())
    }

    async fn ping(&self) -> Result<(), error::SystemError> {
        Err(self.error())
    }
}

#[async_trait::async_trait]
impl ContentStore for DisconnectedStore {
    async fn put(&self, _bytes: Vec<u8>) -> ContentResult<ContentHandle> {
        Err(self.content_error())
    }

    async fn get(&self, _handle: &ContentHandle) -> ContentResult<Vec<u8>> {
        Err(self.content_error())
    }

    async fn delete(&self, _handle: &ContentHandle) -> ContentResult<bool> {
        Err(self.content_error())
    }

    async fn ping(&self) -> ContentResult<()> {
        Err(self.content_error())
    }
}
