use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::borrow::Cow;

use crate::modules::content::ContentError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(Cow<'static, str>),
    #[error("Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Conflict: {0}")]
    Conflict(Cow<'static, str>),
    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(Cow<'static, str>),
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(Cow<'static, str>),
    #[error("Insufficient Storage: {0}")]
    InsufficientStorage(Cow<'static, str>),
    #[error("Internal Server Error")]
    InternalServer,
}

#[derive(serde::Serialize)]
pub struct ErrorBody {
    pub message: Cow<'static, str>,
}

impl Error {
    pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match *self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InsufficientStorage(_) => StatusCode::INSUFFICIENT_STORAGE,
            Error::InternalServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());

        match self {
            // Has Message
            Error::NotFound(msg)
            | Error::Conflict(msg)
            | Error::BadRequest(msg)
            | Error::PayloadTooLarge(msg)
            | Error::ServiceUnavailable(msg)
            | Error::InsufficientStorage(msg) => res.json(ErrorBody { message: msg.clone() }),
            // No Message
            Error::InternalServer => res.json(json!({ "message": "Internal Server Error" })),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SystemError {
    // sqlx errors
    #[error("Database Error : {0}")]
    DatabaseError(Cow<'static, str>),
    #[error("Migration Error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    // Storage errors
    #[error("Storage not configured: {0}")]
    NotConfigured(Cow<'static, str>),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(Cow<'static, str>),
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(Cow<'static, str>),
    #[error("Code already in use: {0}")]
    DuplicateCode(String),
    #[error("No free code after {0} attempts")]
    CodeSpaceExhausted(u32),
    #[error("Inconsistent record {code}: {detail}")]
    Inconsistency { code: String, detail: Cow<'static, str> },
    // Custom Errors
    #[error("Bad Request: {0}")]
    BadRequest(Cow<'static, str>),
    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(Cow<'static, str>),
    #[error("Database Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Database Conflict: {0:?}")]
    Conflict(Option<DbErrorMeta>),
    #[error("Internal System Error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

fn conflict_message(meta: &Option<DbErrorMeta>) -> Cow<'static, str> {
    let Some(m) = meta else {
        return "Duplicate value".into();
    };

    let Some(constraint) = &m.constraint else {
        return "Duplicate value".into();
    };

    // files_code_key -> "Code"
    let field = constraint.trim_end_matches("_key").split('_').next_back().unwrap_or("value");

    let mut chars = field.chars();
    let field = match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Value".to_string(),
    };

    format!("{field} already exists").into()
}

#[derive(Debug)]
pub struct DbErrorMeta {
    pub code: Option<String>,
    pub constraint: Option<String>,
    pub message: String,
}

impl From<SystemError> for Error {
    fn from(value: SystemError) -> Self {
        match value {
            SystemError::BadRequest(msg) => Error::BadRequest(msg),
            SystemError::PayloadTooLarge(msg) => Error::PayloadTooLarge(msg),
            SystemError::NotFound(msg) => Error::NotFound(msg),
            SystemError::Conflict(meta) => Error::Conflict(conflict_message(&meta)),
            SystemError::NotConfigured(msg) => {
                log::error!("Storage not configured: {}", msg);
                Error::ServiceUnavailable("Storage is not configured".into())
            }
            SystemError::StorageUnavailable(msg) => {
                log::error!("Storage unavailable: {}", msg);
                Error::ServiceUnavailable("Storage is unreachable".into())
            }
            SystemError::QuotaExceeded(msg) => Error::InsufficientStorage(msg),
            SystemError::DuplicateCode(_) | SystemError::CodeSpaceExhausted(_) => {
                log::warn!("Code allocation failed: {}", value);
                Error::ServiceUnavailable("Could not allocate a file code, please retry".into())
            }
            SystemError::Inconsistency { ref code, ref detail } => {
                log::error!("Record {} has no content: {}", code, detail);
                Error::InternalServer
            }
            _ => {
                log::error!("Internal Server Error: {:?}", value);
                Error::InternalServer
            }
        }
    }
}

impl From<sqlx::Error> for SystemError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return SystemError::Conflict(Some(DbErrorMeta {
                        code: db_err.code().map(|s| s.to_string()),
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }));
                }
                // Undefined table: the schema is not migrated yet.
                Some("42P01") => {
                    log::error!("Schema missing: {}", db_err.message());
                    return SystemError::StorageUnavailable(db_err.message().to_string().into());
                }
                _ => {
                    log::error!("Unhandled DB error: {:?}", db_err);
                    return SystemError::DatabaseError(db_err.message().to_string().into());
                }
            }
        }
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => {
                log::error!("{:?}", err);
                SystemError::StorageUnavailable(err.to_string().into())
            }
            other => {
                log::error!("{:?}", other);
                SystemError::InternalError(Box::new(other))
            }
        }
    }
}

impl From<ContentError> for SystemError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(handle) => {
                SystemError::NotFound(format!("Content {handle} not found").into())
            }
            ContentError::Unavailable(msg) => SystemError::StorageUnavailable(msg.into()),
            ContentError::QuotaExceeded(msg) => SystemError::QuotaExceeded(msg.into()),
            ContentError::Io(e) => SystemError::IoError(e),
            ContentError::Database(e) => SystemError::from(e),
        }
    }
}

impl SystemError {
    pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage_unavailable(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::StorageUnavailable(msg.into())
    }
}
