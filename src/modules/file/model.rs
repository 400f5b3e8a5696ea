use chrono::{DateTime, TimeDelta, Utc};
use validator::Validate;

use crate::constants::Env;
use crate::modules::content::ContentHandle;
use crate::modules::file::schema::FileEntity;

/// New file metadata to insert into the record store
#[derive(Debug, Clone)]
pub struct NewFile {
    pub code: String,
    pub extension: String,
    pub original_name: String,
    pub content_type: String,
    pub content_handle: ContentHandle,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// A decoded upload, as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A resolved lookup: the record plus its full body.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub record: FileEntity,
    pub bytes: Vec<u8>,
}

/// File hosting configuration
#[derive(Debug, Clone, Validate)]
pub struct FileConfig {
    #[validate(range(min = 1, message = "MAX_UPLOAD_BYTES must be positive"))]
    pub max_file_size: usize,
    pub retention_days: u32,
    #[validate(range(min = 1, max = 64, message = "CODE_LENGTH must be between 1 and 64"))]
    pub code_length: usize,
    #[validate(length(min = 2, message = "CODE_ALPHABET needs at least 2 characters"))]
    pub code_alphabet: String,
    #[validate(range(min = 1, max = 1000, message = "CODE_MAX_ATTEMPTS must be 1..=1000"))]
    pub code_max_attempts: u32,
    #[validate(range(min = 1, max = 1000, message = "LIST_LIMIT must be 1..=1000"))]
    pub list_limit: i64,
    pub public_base_url: Option<String>,
}

impl FileConfig {
    pub fn retention(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.retention_days))
    }

    pub fn expires_at(&self, uploaded_at: DateTime<Utc>) -> DateTime<Utc> {
        uploaded_at + self.retention()
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100MB
            retention_days: 14,
            code_length: 4,
            code_alphabet: crate::constants::DEFAULT_CODE_ALPHABET.to_string(),
            code_max_attempts: 10,
            list_limit: 100,
            public_base_url: None,
        }
    }
}

impl From<&Env> for FileConfig {
    fn from(env: &Env) -> Self {
        Self {
            max_file_size: env.max_upload_bytes,
            retention_days: env.retention_days,
            code_length: env.code_length,
            code_alphabet: env.code_alphabet.clone(),
            code_max_attempts: env.code_max_attempts,
            list_limit: env.list_limit,
            public_base_url: env.public_base_url.clone(),
        }
    }
}
