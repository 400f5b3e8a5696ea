use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::modules::content::ContentHandle;

/// File metadata entity from the record store
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FileEntity {
    pub id: Uuid,
    pub code: String,
    pub extension: String,
    pub original_name: String,
    pub content_type: String,
    pub content_handle: ContentHandle,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub file_id: Uuid,
    pub code: String,
    pub extension: String,
    pub url: String,
    pub delete_url: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Public view of a record; never carries content bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_id: Uuid,
    pub code: String,
    pub original_name: String,
    pub url: String,
    pub delete_url: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub count: usize,
    pub files: Vec<FileInfo>,
    pub next_cursor: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: Option<i64>,
    /// Only records uploaded strictly before this instant.
    pub before: Option<DateTime<Utc>>,
}
