use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::api::error;
use crate::constants::GENERIC_CONTENT_TYPE;
use crate::modules::content::{ContentError, ContentHandle, ContentStore};
use crate::modules::file::{
    code::CodeAllocator,
    extension::{extension_for, parse_lookup_path},
    model::{FileConfig, FileContent, FileUpload, NewFile},
    repository::FileRepository,
    schema::{FileEntity, FileInfo, FileListResponse, FileUploadResponse, ListQuery},
};

#[derive(Clone)]
pub struct FileService {
    file_repo: Arc<dyn FileRepository>,
    content: Arc<dyn ContentStore>,
    allocator: CodeAllocator,
    config: FileConfig,
}

impl FileService {
    pub fn new(
        file_repo: Arc<dyn FileRepository>,
        content: Arc<dyn ContentStore>,
        config: FileConfig,
    ) -> Result<Self, error::SystemError> {
        let allocator = CodeAllocator::from_config(&config)?;
        log::info!(
            "FileService initialized: {} possible codes, {} day retention",
            allocator.code_space(),
            config.retention_days
        );
        Ok(Self { file_repo, content, allocator, config })
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    /// Validate an upload before touching storage
    fn validate_upload(&self, upload: &FileUpload) -> Result<(), error::SystemError> {
        if upload.original_name.trim().is_empty() {
            return Err(error::SystemError::bad_request("No file selected"));
        }

        if upload.bytes.is_empty() {
            return Err(error::SystemError::bad_request("Uploaded file is empty"));
        }

        if upload.bytes.len() > self.config.max_file_size {
            return Err(error::SystemError::PayloadTooLarge(
                format!(
                    "File size exceeds maximum allowed size of {} bytes",
                    self.config.max_file_size
                )
                .into(),
            ));
        }

        Ok(())
    }

    /// Store content, then its record. The content is removed again if no
    /// record could be written for it.
    pub async fn upload_file(
        &self,
        upload: FileUpload,
        base_url: &str,
    ) -> Result<FileUploadResponse, error::SystemError> {
        self.validate_upload(&upload)?;

        let content_type = upload
            .content_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| GENERIC_CONTENT_TYPE.to_string());
        let extension = extension_for(&content_type).to_string();

        let code = self.allocator.allocate(self.file_repo.as_ref()).await?;

        let size = upload.bytes.len() as i64;
        let content_handle = self.content.put(upload.bytes).await?;

        let new_file = NewFile {
            code,
            extension,
            original_name: upload.original_name,
            content_type,
            content_handle,
            size,
            uploaded_at: Utc::now(),
        };

        let entity = match self.insert_record(new_file).await {
            Ok(entity) => entity,
            Err(e) => {
                self.discard_content(&content_handle).await;
                return Err(e);
            }
        };

        log::info!("Stored file {} ({} bytes) as {}", entity.id, entity.size, entity.code);

        Ok(FileUploadResponse {
            file_id: entity.id,
            url: file_url(base_url, &entity),
            delete_url: delete_url(base_url, &entity),
            expires_at: self.config.expires_at(entity.uploaded_at),
            code: entity.code,
            extension: entity.extension,
            size: entity.size,
            content_type: entity.content_type,
        })
    }

    /// Insert, drawing a fresh code whenever the store reports the current
    /// one as taken. Shares the allocator's attempt budget.
    async fn insert_record(&self, mut new_file: NewFile) -> Result<FileEntity, error::SystemError> {
        let max_attempts = self.allocator.max_attempts();
        let mut attempt = 1;

        loop {
            match self.file_repo.insert(&new_file).await {
                Ok(entity) => return Ok(entity),
                Err(error::SystemError::DuplicateCode(code)) if attempt < max_attempts => {
                    attempt += 1;
                    log::warn!(
                        "Code {} was taken concurrently, retrying ({}/{})",
                        code,
                        attempt,
                        max_attempts
                    );
                    new_file.code = self.allocator.allocate(self.file_repo.as_ref()).await?;
                }
                Err(error::SystemError::DuplicateCode(code)) => {
                    log::warn!("Code {} was taken concurrently, giving up", code);
                    return Err(error::SystemError::CodeSpaceExhausted(max_attempts));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn discard_content(&self, handle: &ContentHandle) {
        if let Err(e) = self.content.delete(handle).await {
            log::error!("Failed to remove orphaned content {}: {}", handle, e);
        }
    }

    /// Resolve `{code}` or `{code}.{ext}` to the record and its bytes
    pub async fn get_file_content(&self, path: &str) -> Result<FileContent, error::SystemError> {
        let key =
            parse_lookup_path(path).ok_or_else(|| error::SystemError::not_found("File not found"))?;

        let record = self
            .file_repo
            .find_by_code(&key.code, key.extension.as_deref())
            .await?
            .ok_or_else(|| error::SystemError::not_found("File not found"))?;

        let bytes = match self.content.get(&record.content_handle).await {
            Ok(bytes) => bytes,
            Err(ContentError::NotFound(handle)) => {
                return Err(error::SystemError::Inconsistency {
                    code: record.code,
                    detail: format!("content {handle} of record {} is missing", record.id).into(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.len() as i64 != record.size {
            return Err(error::SystemError::Inconsistency {
                code: record.code,
                detail: format!("expected {} bytes, content has {}", record.size, bytes.len())
                    .into(),
            });
        }

        Ok(FileContent { record, bytes })
    }

    /// Get file metadata by code
    pub async fn get_file_info(
        &self,
        code: &str,
        base_url: &str,
    ) -> Result<FileInfo, error::SystemError> {
        let record = self
            .file_repo
            .find_by_code(code, None)
            .await?
            .ok_or_else(|| error::SystemError::not_found("File not found"))?;

        Ok(self.to_info(&record, base_url, Utc::now()))
    }

    /// Newest first, capped at the configured listing size
    pub async fn list_files(
        &self,
        query: ListQuery,
        base_url: &str,
    ) -> Result<FileListResponse, error::SystemError> {
        let limit = query.limit.unwrap_or(self.config.list_limit).min(self.config.list_limit);
        let now = Utc::now();

        let files: Vec<FileInfo> = self
            .file_repo
            .list(query.before, limit)
            .map_ok(|record| self.to_info(&record, base_url, now))
            .try_collect()
            .await?;

        let next_cursor = if files.len() as i64 == limit {
            files.last().map(|f| f.uploaded_at)
        } else {
            None
        };

        Ok(FileListResponse { count: files.len(), files, next_cursor })
    }

    /// Delete content, then metadata. If the content delete fails the record
    /// stays in place.
    pub async fn delete_file(&self, file_id: &Uuid) -> Result<(), error::SystemError> {
        let file = self
            .file_repo
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("File not found"))?;

        if !self.content.delete(&file.content_handle).await? {
            log::warn!("Content {} of file {} was already gone", file.content_handle, file.id);
        }

        if !self.file_repo.delete_by_id(file_id).await? {
            return Err(error::SystemError::not_found("File not found"));
        }

        log::info!("Deleted file {} ({})", file.id, file.code);
        Ok(())
    }

    pub fn seconds_until_expiry(&self, record: &FileEntity, now: DateTime<Utc>) -> i64 {
        (self.config.expires_at(record.uploaded_at) - now).num_seconds().max(0)
    }

    fn to_info(&self, record: &FileEntity, base_url: &str, now: DateTime<Utc>) -> FileInfo {
        FileInfo {
            file_id: record.id,
            code: record.code.clone(),
            original_name: record.original_name.clone(),
            url: file_url(base_url, record),
            delete_url: delete_url(base_url, record),
            size: record.size,
            content_type: record.content_type.clone(),
            uploaded_at: record.uploaded_at,
            expires_at: self.config.expires_at(record.uploaded_at),
            expires_in_seconds: self.seconds_until_expiry(record, now),
        }
    }
}

fn file_url(base_url: &str, record: &FileEntity) -> String {
    format!("{}/{}.{}", base_url, record.code, record.extension)
}

fn delete_url(base_url: &str, record: &FileEntity) -> String {
    format!("{}/delete/{}", base_url, record.id)
}
