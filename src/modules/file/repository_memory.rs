use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::{stream::BoxStream, StreamExt};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    api::error,
    modules::file::{
        model::NewFile,
        repository::{ExpiryCursor, FileRepository},
        schema::FileEntity,
    },
};

#[derive(Default)]
struct Records {
    by_id: HashMap<Uuid, FileEntity>,
    by_code: HashMap<String, Uuid>,
}

impl Records {
    fn remove(&mut self, file_id: &Uuid) -> Option<FileEntity> {
        let entity = self.by_id.remove(file_id)?;
        self.by_code.remove(&entity.code);
        Some(entity)
    }
}

/// Record store kept in process memory. Uniqueness of `code` is enforced
/// under the write guard, mirroring the `UNIQUE (code)` constraint in Postgres.
#[derive(Default)]
pub struct FileMemoryRepository {
    records: RwLock<Records>,
}

impl FileMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }
}

#[async_trait::async_trait]
impl FileRepository for FileMemoryRepository {
    async fn insert(&self, file: &NewFile) -> Result<FileEntity, error::SystemError> {
        let mut records = self.records.write().await;

        if records.by_code.contains_key(&file.code) {
            return Err(error::SystemError::DuplicateCode(file.code.clone()));
        }

        let entity = FileEntity {
            id: Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)),
            code: file.code.clone(),
            extension: file.extension.clone(),
            original_name: file.original_name.clone(),
            content_type: file.content_type.clone(),
            content_handle: file.content_handle,
            size: file.size,
            uploaded_at: file.uploaded_at,
        };
        records.by_code.insert(entity.code.clone(), entity.id);
        records.by_id.insert(entity.id, entity.clone());

        Ok(entity)
    }

    async fn find_by_code(
        &self,
        code: &str,
        extension: Option<&str>,
    ) -> Result<Option<FileEntity>, error::SystemError> {
        let records = self.records.read().await;
        let file = records
            .by_code
            .get(code)
            .and_then(|id| records.by_id.get(id))
            .filter(|f| extension.is_none_or(|ext| f.extension == ext))
            .cloned();
        Ok(file)
    }

    async fn find_by_id(&self, file_id: &Uuid) -> Result<Option<FileEntity>, error::SystemError> {
        Ok(self.records.read().await.by_id.get(file_id).cloned())
    }

    fn list(
        &self,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> BoxStream<'_, Result<FileEntity, error::SystemError>> {
        futures_util::stream::once(async move {
            let records = self.records.read().await;
            let mut page: Vec<FileEntity> = records
                .by_id
                .values()
                .filter(|f| before.is_none_or(|b| f.uploaded_at < b))
                .cloned()
                .collect();
            page.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
            page.truncate(usize::try_from(limit).unwrap_or(0));
            futures_util::stream::iter(page.into_iter().map(Ok))
        })
        .flatten()
        .boxed()
    }

    async fn find_expired(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<ExpiryCursor>,
        limit: i64,
    ) -> Result<Vec<FileEntity>, error::SystemError> {
        let records = self.records.read().await;
        let mut expired: Vec<FileEntity> = records
            .by_id
            .values()
            .filter(|f| f.uploaded_at < cutoff)
            .filter(|f| after.is_none_or(|last| (f.uploaded_at, f.id) > last))
            .cloned()
            .collect();
        expired.sort_by_key(|f| (f.uploaded_at, f.id));
        expired.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(expired)
    }

    async fn delete_by_id(&self, file_id: &Uuid) -> Result<bool, error::SystemError> {
        Ok(self.records.write().await.remove(file_id).is_some())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, error::SystemError> {
        let mut records = self.records.write().await;
        let expired: Vec<Uuid> =
            records.by_id.values().filter(|f| f.uploaded_at < cutoff).map(|f| f.id).collect();
        for id in &expired {
            records.remove(id);
        }
        Ok(expired.len() as u64)
    }

    async fn ping(&self) -> Result<(), error::SystemError> {
        Ok(())
    }
}
