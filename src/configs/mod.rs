pub mod disconnected;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::api::error;
use crate::configs::disconnected::DisconnectedStore;
use crate::constants::Env;
use crate::modules::content::{ContentStore, DiskContentStore, MemoryContentStore, PgContentStore};
use crate::modules::file::{FileMemoryRepository, FilePgRepository, FileRepository};

const MIGRATION_RETRY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStatus {
    Connected,
    /// `DATABASE_URL` missing or unusable as written.
    NotConfigured(String),
    /// Configured, but a backend could not be set up at start-up.
    Unreachable(String),
}

impl StorageStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, StorageStatus::Connected)
    }
}

impl std::fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageStatus::Connected => write!(f, "connected"),
            StorageStatus::NotConfigured(reason) => write!(f, "not configured: {reason}"),
            StorageStatus::Unreachable(reason) => write!(f, "unreachable: {reason}"),
        }
    }
}

/// The storage clients handed to every component. Built once in `main`.
#[derive(Clone)]
pub struct Storage {
    pub status: StorageStatus,
    pub records: Arc<dyn FileRepository>,
    pub content: Arc<dyn ContentStore>,
}

impl Storage {
    pub fn in_memory() -> Self {
        Self {
            status: StorageStatus::Connected,
            records: Arc::new(FileMemoryRepository::new()),
            content: Arc::new(MemoryContentStore::new()),
        }
    }

    pub fn disconnected(status: StorageStatus) -> Self {
        let store = Arc::new(DisconnectedStore::new(status.clone()));
        Self { status, records: store.clone(), content: store }
    }
}

/// Build the pool without connecting. Connections are opened on first use,
/// so a database that is down at start-up is picked up once it comes back.
pub fn connect_database(database_url: &str) -> Result<PgPool, error::SystemError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .acquire_slow_threshold(Duration::from_secs(3))
        .connect_lazy(database_url)?;
    Ok(pool)
}

/// Apply the embedded migrations, retrying until the database answers.
pub async fn migrate_until_ready(pool: PgPool, retry: Duration) {
    let mut attempt: u32 = 1;
    loop {
        match sqlx::migrate!("./migrations").run(&pool).await {
            Ok(()) => {
                log::info!("Database schema is up to date");
                return;
            }
            Err(e) => {
                log::warn!(
                    "Migrations not applied (attempt {}), retrying in {}s: {}",
                    attempt,
                    retry.as_secs(),
                    e
                );
                attempt = attempt.saturating_add(1);
                tokio::time::sleep(retry).await;
            }
        }
    }
}

/// Resolve `DATABASE_URL` into storage clients. Never fails: problems are
/// carried in `Storage::status` and served by a `DisconnectedStore`.
pub async fn connect_storage(env: &Env) -> Storage {
    let Some(url) = env.database_url.as_deref() else {
        return Storage::disconnected(StorageStatus::NotConfigured(
            "DATABASE_URL environment variable not set".into(),
        ));
    };

    let scheme = url.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("memory") => {
            log::warn!("Using in-memory storage; files are lost on restart");
            Storage::in_memory()
        }
        Some("postgres") | Some("postgresql") => connect_postgres(env, url).await,
        Some(other) => Storage::disconnected(StorageStatus::NotConfigured(format!(
            "unsupported DATABASE_URL scheme {other:?}"
        ))),
        None => Storage::disconnected(StorageStatus::NotConfigured(
            "DATABASE_URL is not a URI".into(),
        )),
    }
}

async fn connect_postgres(env: &Env, url: &str) -> Storage {
    let pool = match connect_database(url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Invalid DATABASE_URL: {}", e);
            return Storage::disconnected(StorageStatus::NotConfigured(format!(
                "Invalid DATABASE_URL: {e}"
            )));
        }
    };

    let content: Arc<dyn ContentStore> = match env.content_backend.as_deref() {
        None | Some("postgres") => Arc::new(PgContentStore::new(pool.clone())),
        Some("disk") => match DiskContentStore::new(&env.content_dir).await {
            Ok(store) => {
                log::info!("Storing file content under {}", store.root().display());
                Arc::new(store)
            }
            Err(e) => {
                return Storage::disconnected(StorageStatus::Unreachable(e.to_string()));
            }
        },
        Some(other) => {
            return Storage::disconnected(StorageStatus::NotConfigured(format!(
                "unsupported CONTENT_BACKEND {other:?}"
            )));
        }
    };

    tokio::spawn(migrate_until_ready(pool.clone(), MIGRATION_RETRY));
    log::info!("Using Postgres record store");
    Storage {
        status: StorageStatus::Connected,
        records: Arc::new(FilePgRepository::new(pool)),
        content,
    }
}
