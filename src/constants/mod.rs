use std::str::FromStr;

pub const DEFAULT_CODE_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";
pub const GENERIC_EXTENSION: &str = "bin";

/// Paths served by the API itself; never resolved as file codes.
pub const RESERVED_PATHS: [&str; 5] = ["upload", "health", "files", "info", "delete"];

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Env {
    pub database_url: Option<String>,
    pub content_backend: Option<String>,
    pub content_dir: String,
    pub public_base_url: Option<String>,
    pub ip: String,
    pub port: u16,
    pub workers: usize,
    pub retention_days: u32,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,
    pub code_length: usize,
    pub code_alphabet: String,
    pub code_max_attempts: u32,
    pub list_limit: i64,
    pub max_upload_bytes: usize,
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: &str) -> T {
    let raw = optional_var(key).unwrap_or_else(|| default.to_string());
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => panic!("{key} must be a valid {}, got {raw:?}", std::any::type_name::<T>()),
    }
}

impl Env {
    fn new() -> Self {
        let database_url = optional_var("DATABASE_URL");
        let content_backend = optional_var("CONTENT_BACKEND").map(|b| b.to_lowercase());
        let content_dir = optional_var("CONTENT_DIR").unwrap_or_else(|| "./uploads".to_string());
        let public_base_url =
            optional_var("PUBLIC_BASE_URL").map(|u| u.trim_end_matches('/').to_string());

        let ip = optional_var("IP").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_var::<u16>("PORT", "8080");
        let workers = parse_var::<usize>("WORKERS", "2");

        let retention_days = parse_var::<u32>("RETENTION_DAYS", "14");
        let sweep_interval_secs = parse_var::<u64>("SWEEP_INTERVAL_SECS", "21600");
        let sweep_batch_size = parse_var::<i64>("SWEEP_BATCH_SIZE", "1000");

        let code_length = parse_var::<usize>("CODE_LENGTH", "4");
        let code_alphabet =
            optional_var("CODE_ALPHABET").unwrap_or_else(|| DEFAULT_CODE_ALPHABET.to_string());
        let code_max_attempts = parse_var::<u32>("CODE_MAX_ATTEMPTS", "10");

        let list_limit = parse_var::<i64>("LIST_LIMIT", "100");
        let max_upload_bytes = parse_var::<usize>("MAX_UPLOAD_BYTES", "104857600");

        Env {
            database_url,
            content_backend,
            content_dir,
            public_base_url,
            ip,
            port,
            workers,
            retention_days,
            sweep_interval_secs,
            sweep_batch_size,
            code_length,
            code_alphabet,
            code_max_attempts,
            list_limit,
            max_upload_bytes,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
