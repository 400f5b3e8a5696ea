use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use validator::Validate;

use crate::api::error;
use crate::constants::Env;
use crate::modules::content::ContentStore;
use crate::modules::file::{repository::FileRepository, schema::FileEntity};

#[derive(Debug, Clone, Validate)]
pub struct SweepConfig {
    pub retention_days: u32,
    #[validate(range(min = 1, message = "SWEEP_INTERVAL_SECS must be positive"))]
    pub interval_secs: u64,
    #[validate(range(min = 1, message = "SWEEP_BATCH_SIZE must be positive"))]
    pub batch_size: i64,
}

impl SweepConfig {
    pub fn retention(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.retention_days))
    }
}

impl From<&Env> for SweepConfig {
    fn from(env: &Env) -> Self {
        Self {
            retention_days: env.retention_days,
            interval_secs: env.sweep_interval_secs,
            batch_size: env.sweep_batch_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub cutoff: Option<DateTime<Utc>>,
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped_overlap: bool,
}

/// Releases the in-progress flag when a cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Deletes records older than the retention window, content first.
pub struct RetentionSweeper {
    records: Arc<dyn FileRepository>,
    content: Arc<dyn ContentStore>,
    config: SweepConfig,
    running: AtomicBool,
}

impl RetentionSweeper {
    pub fn new(
        records: Arc<dyn FileRepository>,
        content: Arc<dyn ContentStore>,
        config: SweepConfig,
    ) -> Self {
        Self { records, content, config, running: AtomicBool::new(false) }
    }

    /// Run the timer until `shutdown` turns true or its sender is dropped.
    /// The first cycle starts immediately.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(self.config.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                interval_secs = self.config.interval_secs,
                retention_days = self.config.retention_days,
                "Retention sweeper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Retention sweeper stopped");
        })
    }

    /// One sweep cycle. Returns immediately with `skipped_overlap` when
    /// another cycle is still running.
    pub async fn run_cycle(&self) -> SweepReport {
        let Some(_guard) = CycleGuard::acquire(&self.running) else {
            tracing::warn!("Previous sweep still running, skipping this cycle");
            return SweepReport { skipped_overlap: true, ..SweepReport::default() };
        };

        let cutoff = Utc::now() - self.config.retention();
        let mut report = SweepReport { cutoff: Some(cutoff), ..SweepReport::default() };

        // Walk the expired set batch by batch. The cursor moves past records
        // that failed, so they cannot starve newer ones.
        let mut after = None;
        loop {
            let batch = match self.records.find_expired(cutoff, after, self.config.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to list expired files");
                    break;
                }
            };
            let drained = (batch.len() as i64) < self.config.batch_size;
            after = batch.last().map(|f| (f.uploaded_at, f.id));
            report.expired += batch.len();

            for record in batch {
                match self.expire(&record).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            error = %e,
                            file_id = %record.id,
                            code = %record.code,
                            "Failed to expire file, retrying next cycle"
                        );
                    }
                }
            }

            if drained || after.is_none() {
                break;
            }
        }

        tracing::info!(
            cutoff = %cutoff,
            expired = report.expired,
            deleted = report.deleted,
            failed = report.failed,
            "Sweep cycle completed"
        );
        report
    }

    /// Content first; the record is only removed once its content is gone.
    async fn expire(&self, record: &FileEntity) -> Result<(), error::SystemError> {
        if !self.content.delete(&record.content_handle).await? {
            tracing::debug!(handle = %record.content_handle, "Content already gone");
        }

        if !self.records.delete_by_id(&record.id).await? {
            tracing::debug!(file_id = %record.id, "Record already deleted");
        }

        tracing::debug!(file_id = %record.id, code = %record.code, "Expired file deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::modules::content::{
        ContentError, ContentHandle, ContentResult, MemoryContentStore,
    };
    use crate::modules::file::{model::NewFile, repository_memory::FileMemoryRepository};

    fn config(retention_days: u32) -> SweepConfig {
        SweepConfig { retention_days, interval_secs: 3600, batch_size: 100 }
    }

    fn batched(retention_days: u32, batch_size: i64) -> SweepConfig {
        SweepConfig { batch_size, ..config(retention_days) }
    }

    async fn store_file(
        repo: &FileMemoryRepository,
        content: &dyn ContentStore,
        code: &str,
        age: TimeDelta,
    ) -> FileEntity {
        let content_handle = content.put(code.as_bytes().to_vec()).await.unwrap();
        repo.insert(&NewFile {
            code: code.to_string(),
            extension: "txt".into(),
            original_name: format!("{code}.txt"),
            content_type: "text/plain".into(),
            content_handle,
            size: code.len() as i64,
            uploaded_at: Utc::now() - age,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_expired_files_are_removed_young_files_survive() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(MemoryContentStore::new());
        let old = store_file(&repo, content.as_ref(), "old1", TimeDelta::days(15)).await;
        let young = store_file(&repo, content.as_ref(), "new1", TimeDelta::days(13)).await;
        let sweeper = RetentionSweeper::new(repo.clone(), content.clone(), config(14));

        let report = sweeper.run_cycle().await;
        assert_eq!((report.expired, report.deleted, report.failed), (1, 1, 0));
        assert!(repo.find_by_id(&old.id).await.unwrap().is_none());
        assert!(!content.contains(&old.content_handle).await);

        for _ in 0..3 {
            assert_eq!(sweeper.run_cycle().await.expired, 0);
        }
        assert!(repo.find_by_id(&young.id).await.unwrap().is_some());
        assert!(content.contains(&young.content_handle).await);
    }

    #[tokio::test]
    async fn test_zero_retention_removes_fresh_upload() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(MemoryContentStore::new());
        let file = store_file(&repo, content.as_ref(), "aB3x", TimeDelta::milliseconds(5)).await;
        let sweeper = RetentionSweeper::new(repo.clone(), content.clone(), config(0));

        assert_eq!(sweeper.run_cycle().await.deleted, 1);
        assert!(repo.find_by_code(&file.code, None).await.unwrap().is_none());
        assert_eq!(content.len().await, 0);
    }

    #[tokio::test]
    async fn test_missing_content_still_clears_record() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(MemoryContentStore::new());
        let file = store_file(&repo, content.as_ref(), "gone", TimeDelta::days(30)).await;
        content.delete(&file.content_handle).await.unwrap();
        let sweeper = RetentionSweeper::new(repo.clone(), content, config(14));

        assert_eq!(sweeper.run_cycle().await.deleted, 1);
        assert_eq!(repo.len().await, 0);
    }

    /// Fails deletes for the handles in `broken`; can stall deletes.
    struct FlakyContent {
        inner: MemoryContentStore,
        broken: std::sync::Mutex<HashSet<ContentHandle>>,
        delay: Duration,
        deletes: AtomicUsize,
    }

    impl FlakyContent {
        fn new(delay: Duration) -> Self {
            Self {
                inner: MemoryContentStore::new(),
                broken: std::sync::Mutex::new(HashSet::new()),
                delay,
                deletes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ContentStore for FlakyContent {
        async fn put(&self, bytes: Vec<u8>) -> ContentResult<ContentHandle> {
            self.inner.put(bytes).await
        }
        async fn get(&self, handle: &ContentHandle) -> ContentResult<Vec<u8>> {
            self.inner.get(handle).await
        }
        async fn delete(&self, handle: &ContentHandle) -> ContentResult<bool> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let broken = self.broken.lock().unwrap().contains(handle);
            if broken {
                return Err(ContentError::Unavailable("blob store timeout".into()));
            }
            self.inner.delete(handle).await
        }
        async fn ping(&self) -> ContentResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_content_failure_keeps_record_and_others_proceed() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(FlakyContent::new(Duration::ZERO));
        let stuck = store_file(&repo, content.as_ref(), "stk1", TimeDelta::days(20)).await;
        store_file(&repo, content.as_ref(), "ok01", TimeDelta::days(21)).await;
        store_file(&repo, content.as_ref(), "ok02", TimeDelta::days(22)).await;
        content.broken.lock().unwrap().insert(stuck.content_handle);
        let sweeper = RetentionSweeper::new(repo.clone(), content.clone(), config(14));

        let report = sweeper.run_cycle().await;
        assert_eq!((report.expired, report.deleted, report.failed), (3, 2, 1));
        // No metadata may outlive its content, but the reverse is retried.
        assert!(repo.find_by_id(&stuck.id).await.unwrap().is_some());
        assert!(content.inner.contains(&stuck.content_handle).await);

        content.broken.lock().unwrap().clear();
        let report = sweeper.run_cycle().await;
        assert_eq!((report.expired, report.deleted), (1, 1));
        assert_eq!(repo.len().await, 0);
    }

    #[tokio::test]
    async fn test_backlog_larger_than_a_batch_clears_in_one_cycle() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(MemoryContentStore::new());
        for (i, days) in [30, 25, 20].into_iter().enumerate() {
            store_file(&repo, content.as_ref(), &format!("old{i}"), TimeDelta::days(days)).await;
        }
        let young = store_file(&repo, content.as_ref(), "new1", TimeDelta::days(1)).await;
        let sweeper = RetentionSweeper::new(repo.clone(), content.clone(), batched(14, 2));

        let report = sweeper.run_cycle().await;
        assert_eq!((report.expired, report.deleted, report.failed), (3, 3, 0));
        assert_eq!(repo.len().await, 1);
        assert!(repo.find_by_id(&young.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failing_head_of_batch_does_not_starve_newer_records() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(FlakyContent::new(Duration::ZERO));
        let stuck_a = store_file(&repo, content.as_ref(), "stk1", TimeDelta::days(30)).await;
        let stuck_b = store_file(&repo, content.as_ref(), "stk2", TimeDelta::days(29)).await;
        let healthy = store_file(&repo, content.as_ref(), "ok01", TimeDelta::days(20)).await;
        {
            let mut broken = content.broken.lock().unwrap();
            broken.insert(stuck_a.content_handle);
            broken.insert(stuck_b.content_handle);
        }
        let sweeper = RetentionSweeper::new(repo.clone(), content.clone(), batched(14, 2));

        let report = sweeper.run_cycle().await;
        assert_eq!((report.expired, report.deleted, report.failed), (3, 1, 2));
        assert!(repo.find_by_id(&healthy.id).await.unwrap().is_none());
        assert!(repo.find_by_id(&stuck_a.id).await.unwrap().is_some());
        assert!(repo.find_by_id(&stuck_b.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overlapping_cycles_are_skipped() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(FlakyContent::new(Duration::from_millis(200)));
        store_file(&repo, content.as_ref(), "old1", TimeDelta::days(20)).await;
        let sweeper = RetentionSweeper::new(repo.clone(), content.clone(), config(14));

        let (first, second) = tokio::join!(sweeper.run_cycle(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sweeper.run_cycle().await
        });

        assert!(!first.skipped_overlap);
        assert_eq!(first.deleted, 1);
        assert!(second.skipped_overlap);
        assert_eq!(content.deletes.load(Ordering::SeqCst), 1);

        // The guard is released once the cycle ends.
        assert!(!sweeper.run_cycle().await.skipped_overlap);
    }

    #[tokio::test]
    async fn test_started_sweeper_runs_and_stops() {
        let repo = Arc::new(FileMemoryRepository::new());
        let content = Arc::new(MemoryContentStore::new());
        store_file(&repo, content.as_ref(), "old1", TimeDelta::days(20)).await;
        let sweeper = Arc::new(RetentionSweeper::new(repo.clone(), content.clone(), config(14)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = sweeper.start(shutdown_rx);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while repo.len().await > 0 {
            assert!(tokio::time::Instant::now() < deadline, "first cycle never ran");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(content.len().await, 0);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
