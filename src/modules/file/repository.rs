use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use uuid::Uuid;

use crate::{
    api::error,
    modules::file::{model::NewFile, schema::FileEntity},
};

/// Position of the last record seen while walking expired records.
pub type ExpiryCursor = (DateTime<Utc>, Uuid);

#[async_trait::async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a record. Fails with `DuplicateCode` when `file.code` is already
    /// live; the check and the write are one atomic step.
    async fn insert(&self, file: &NewFile) -> Result<FileEntity, error::SystemError>;

    /// When `extension` is given it must equal the stored extension.
    async fn find_by_code(
        &self,
        code: &str,
        extension: Option<&str>,
    ) -> Result<Option<FileEntity>, error::SystemError>;

    async fn find_by_id(&self, file_id: &Uuid) -> Result<Option<FileEntity>, error::SystemError>;

    /// Newest first, at most `limit` records, optionally only those uploaded
    /// strictly before `before`.
    fn list(
        &self,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> BoxStream<'_, Result<FileEntity, error::SystemError>>;

    /// Oldest first (`uploaded_at`, then `id`), records with
    /// `uploaded_at < cutoff` that sort strictly after `after`.
    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<ExpiryCursor>,
        limit: i64,
    ) -> Result<Vec<FileEntity>, error::SystemError>;

    async fn delete_by_id(&self, file_id: &Uuid) -> Result<bool, error::SystemError>;

    /// Metadata-only bulk delete of records with `uploaded_at < cutoff`.
    /// The caller owns the matching content cleanup.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, error::SystemError>;

    async fn ping(&self) -> Result<(), error::SystemError>;
}
