use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::configs::{Storage, StorageStatus};
use crate::constants::VERSION;

#[derive(Debug, Serialize)]
pub struct ServiceDescriptor {
    pub message: &'static str,
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub retention_days: u32,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database_url_set: bool,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why the service is unhealthy; the HTTP layer picks the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    NotConfigured,
    Unreachable,
}

#[derive(Clone)]
pub struct StatusService {
    storage: Storage,
    database_url_set: bool,
    retention_days: u32,
    sweep_interval_secs: u64,
}

impl StatusService {
    pub fn new(
        storage: Storage,
        database_url_set: bool,
        retention_days: u32,
        sweep_interval_secs: u64,
    ) -> Self {
        Self { storage, database_url_set, retention_days, sweep_interval_secs }
    }

    fn database_label(&self) -> &'static str {
        if self.storage.status.is_connected() {
            "connected"
        } else {
            "disconnected"
        }
    }

    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            message: "API is running",
            status: "online",
            database: self.database_label(),
            version: VERSION,
            retention_days: self.retention_days,
            sweep_interval_secs: self.sweep_interval_secs,
        }
    }

    /// Pings both stores when connected; otherwise reports the start-up failure.
    pub async fn health(&self) -> (HealthState, HealthReport) {
        let (state, error) = match &self.storage.status {
            StorageStatus::NotConfigured(reason) => (HealthState::NotConfigured, Some(reason.clone())),
            StorageStatus::Unreachable(reason) => (HealthState::Unreachable, Some(reason.clone())),
            StorageStatus::Connected => {
                let records = self.storage.records.ping().await;
                let content = self.storage.content.ping().await;
                match (records, content) {
                    (Ok(()), Ok(())) => (HealthState::Healthy, None),
                    (Err(e), _) => {
                        (HealthState::Unreachable, Some(format!("Record store unreachable: {e}")))
                    }
                    (_, Err(e)) => {
                        (HealthState::Unreachable, Some(format!("Content store unreachable: {e}")))
                    }
                }
            }
        };

        let healthy = state == HealthState::Healthy;
        let report = HealthReport {
            status: if healthy { "healthy" } else { "unhealthy" },
            timestamp: Utc::now(),
            database_url_set: self.database_url_set,
            database: if healthy { "connected" } else { "disconnected" },
            error,
        };
        (state, report)
    }
}
