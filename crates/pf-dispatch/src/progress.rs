//! Progress Store - concurrent job progress tracking
//!
//! Features:
//! - Lock-free concurrent reads and writes via DashMap
//! - Monotonic progress counters, capped at the job total
//! - Snapshot reads that never block dispatch
//! - Capacity eviction plus a periodic retention sweep for finished jobs

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pf_common::{FailureKind, JobFailure, JobSnapshot, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the progress store
#[derive(Debug, Clone)]
pub struct ProgressStoreConfig {
    /// How long finished jobs stay queryable before the sweeper drops them
    pub retention: Duration,
    /// Maximum number of tracked jobs before oldest finished jobs are evicted
    pub max_jobs: usize,
    /// How often the background sweeper runs
    pub sweep_interval: Duration,
}

impl Default for ProgressStoreConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(3600),
            max_jobs: 10_000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Internal per-job record
#[derive(Debug, Clone)]
struct JobRecord {
    status: JobStatus,
    progress: u64,
    total: u64,
    error: Option<JobFailure>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Pending,
            progress: 0,
            total: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            progress: self.progress,
            total: self.total,
            error: self.error.clone(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Concurrent map of job id to dispatch progress
pub struct ProgressStore {
    jobs: DashMap<String, JobRecord>,
    config: ProgressStoreConfig,
}

impl ProgressStore {
    pub fn new(config: ProgressStoreConfig) -> Self {
        Self {
            jobs: DashMap::new(),
            config,
        }
    }

    /// Register a new job in Pending state
    pub fn create(&self, job_id: &str) {
        if self.jobs.len() >= self.config.max_jobs {
            self.evict_oldest_finished();
        }

        if self.jobs.contains_key(job_id) {
            warn!(job_id = %job_id, "Job already tracked, ignoring duplicate create");
            return;
        }

        self.jobs.insert(job_id.to_string(), JobRecord::new());
    }

    /// Transition a pending job to Running and record its token total
    pub fn start(&self, job_id: &str, total: u64) {
        match self.jobs.get_mut(job_id) {
            Some(mut record) => {
                if record.status != JobStatus::Pending {
                    warn!(
                        job_id = %job_id,
                        status = ?record.status,
                        "Ignoring start for job that is not pending"
                    );
                    return;
                }
                record.status = JobStatus::Running;
                record.total = total;
                record.touch();
            }
            None => warn!(job_id = %job_id, "Cannot start unknown job"),
        }
    }

    /// Add a delivered batch to a running job's progress counter
    ///
    /// Progress never exceeds the recorded total. Updates against jobs that
    /// are not Running are dropped.
    pub fn record_batch(&self, job_id: &str, delivered: u64) {
        match self.jobs.get_mut(job_id) {
            Some(mut record) => {
                if record.status != JobStatus::Running {
                    warn!(
                        job_id = %job_id,
                        status = ?record.status,
                        "Ignoring batch progress for job that is not running"
                    );
                    return;
                }
                record.progress = (record.progress + delivered).min(record.total);
                record.touch();
            }
            None => warn!(job_id = %job_id, "Cannot record progress for unknown job"),
        }
    }

    /// Mark a running job as Succeeded
    pub fn succeed(&self, job_id: &str) {
        match self.jobs.get_mut(job_id) {
            Some(mut record) => {
                if record.status != JobStatus::Running {
                    warn!(
                        job_id = %job_id,
                        status = ?record.status,
                        "Ignoring success for job that is not running"
                    );
                    return;
                }
                record.status = JobStatus::Succeeded;
                record.touch();
            }
            None => warn!(job_id = %job_id, "Cannot mark unknown job as succeeded"),
        }
    }

    /// Mark a pending or running job as Failed with a failure record
    pub fn fail(&self, job_id: &str, kind: FailureKind, message: impl Into<String>) {
        match self.jobs.get_mut(job_id) {
            Some(mut record) => {
                if record.status.is_terminal() {
                    warn!(
                        job_id = %job_id,
                        status = ?record.status,
                        "Ignoring failure for job that already finished"
                    );
                    return;
                }
                record.status = JobStatus::Failed;
                record.error = Some(JobFailure::new(kind, message));
                record.touch();
            }
            None => warn!(job_id = %job_id, "Cannot mark unknown job as failed"),
        }
    }

    /// Snapshot a job's progress; unknown ids read as an empty pending job
    pub fn snapshot(&self, job_id: &str) -> JobSnapshot {
        self.jobs
            .get(job_id)
            .map(|record| record.snapshot())
            .unwrap_or_default()
    }

    /// Number of jobs currently tracked
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Drop finished jobs whose last update is older than the retention window
    pub fn sweep(&self) {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.retention.as_secs() as i64);

        // Counted inside the closure: jobs created while the sweep scans
        // other shards must not skew the removal count
        let mut removed = 0usize;
        self.jobs.retain(|_, record| {
            let expired = record.status.is_terminal() && record.updated_at < cutoff;
            if expired {
                removed += 1;
            }
            !expired
        });

        if removed > 0 {
            info!(
                removed = removed,
                remaining = self.jobs.len(),
                "Swept expired jobs from progress store"
            );
        }
    }

    /// Evict the oldest finished jobs to make room for new ones
    ///
    /// Removes up to 10% of capacity. Jobs still pending or running are never
    /// evicted.
    fn evict_oldest_finished(&self) {
        let to_remove = self.config.max_jobs / 10;
        if to_remove == 0 {
            return;
        }

        let mut finished: Vec<(String, DateTime<Utc>)> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().status.is_terminal())
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        finished.sort_by_key(|(_, created_at)| *created_at);

        let mut removed = 0;
        for (job_id, _) in finished.into_iter().take(to_remove) {
            self.jobs.remove(&job_id);
            removed += 1;
        }

        if removed > 0 {
            warn!(
                removed = removed,
                remaining = self.jobs.len(),
                "Progress store at capacity, evicted oldest finished jobs"
            );
        }
    }
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(ProgressStoreConfig::default())
    }
}

/// Spawn the background retention sweeper
///
/// Runs until the shutdown signal fires.
pub fn spawn_retention_sweeper(
    store: Arc<ProgressStore>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let interval = store.config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    store.sweep();
                }
                _ = shutdown_rx.recv() => {
                    debug!("Retention sweeper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ProgressStore {
        ProgressStore::default()
    }

    #[test]
    fn test_lifecycle_reaches_succeeded() {
        let store = store();
        store.create("job-1");
        store.start("job-1", 300);
        store.record_batch("job-1", 150);
        store.record_batch("job-1", 150);
        store.succeed("job-1");

        let snapshot = store.snapshot("job-1");
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.progress, 300);
        assert_eq!(snapshot.total, 300);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_unknown_job_reads_as_zero_snapshot() {
        let store = store();
        let snapshot = store.snapshot("no-such-job");

        assert_eq!(snapshot.status, JobStatus::Pending);
        assert_eq!(snapshot.progress, 0);
        assert_eq!(snapshot.total, 0);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_progress_is_capped_at_total() {
        let store = store();
        store.create("job-1");
        store.start("job-1", 100);
        store.record_batch("job-1", 80);
        store.record_batch("job-1", 80);

        assert_eq!(store.snapshot("job-1").progress, 100);
    }

    #[test]
    fn test_failure_preserves_partial_progress() {
        let store = store();
        store.create("job-1");
        store.start("job-1", 320);
        store.record_batch("job-1", 150);
        store.fail("job-1", FailureKind::Gateway, "Failed to send notifications");

        let snapshot = store.snapshot("job-1");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.progress, 150);
        assert_eq!(snapshot.total, 320);
        let failure = snapshot.error.unwrap();
        assert_eq!(failure.kind, FailureKind::Gateway);
        assert_eq!(failure.message, "Failed to send notifications");
    }

    #[test]
    fn test_pending_job_can_fail_directly() {
        let store = store();
        store.create("job-1");
        store.fail("job-1", FailureKind::Parse, "bad token file");

        let snapshot = store.snapshot("job-1");
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.error.unwrap().kind, FailureKind::Parse);
    }

    #[test]
    fn test_finished_job_ignores_further_updates() {
        let store = store();
        store.create("job-1");
        store.start("job-1", 100);
        store.succeed("job-1");

        store.record_batch("job-1", 50);
        store.fail("job-1", FailureKind::Internal, "late failure");

        let snapshot = store.snapshot("job-1");
        assert_eq!(snapshot.status, JobStatus::Succeeded);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_start_is_honored_only_from_pending() {
        let store = store();
        store.create("job-1");
        store.start("job-1", 100);
        store.start("job-1", 999);

        let snapshot = store.snapshot("job-1");
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.total, 100);
    }

    #[test]
    fn test_duplicate_create_is_ignored() {
        let store = store();
        store.create("job-1");
        store.start("job-1", 50);
        store.create("job-1");

        assert_eq!(store.snapshot("job-1").total, 50);
        assert_eq!(store.job_count(), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired_finished_jobs() {
        let store = ProgressStore::new(ProgressStoreConfig {
            retention: Duration::from_secs(0),
            ..ProgressStoreConfig::default()
        });

        store.create("done");
        store.start("done", 10);
        store.record_batch("done", 10);
        store.succeed("done");

        store.create("active");
        store.start("active", 10);

        std::thread::sleep(Duration::from_millis(5));
        store.sweep();

        assert_eq!(store.job_count(), 1);
        assert_eq!(store.snapshot("active").status, JobStatus::Running);
        // The finished job now reads as unknown
        assert_eq!(store.snapshot("done").total, 0);
    }

    #[test]
    fn test_sweep_with_concurrent_creates() {
        let store = Arc::new(ProgressStore::new(ProgressStoreConfig {
            retention: Duration::from_secs(0),
            max_jobs: 1_000_000,
            ..ProgressStoreConfig::default()
        }));

        // Mostly running jobs: each sweep scans many records while dropping
        // few, leaving a wide window for inserts to land mid-scan
        for i in 0..10_000 {
            let id = format!("active-{}", i);
            store.create(&id);
            store.start(&id, 1);
        }
        for i in 0..100 {
            let id = format!("done-{}", i);
            store.create(&id);
            store.start(&id, 1);
            store.succeed(&id);
        }

        let sweeper = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    store.sweep();
                }
            })
        };
        let creator = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    store.create(&format!("new-{}", i));
                }
            })
        };

        sweeper.join().expect("sweep panicked under concurrent creates");
        creator.join().expect("create panicked during sweep");

        // Running and newly created jobs all survive
        assert!(store.job_count() >= 20_000);
        assert_eq!(store.snapshot("active-0").status, JobStatus::Running);
        assert_eq!(store.snapshot("new-0").status, JobStatus::Pending);
    }

    #[test]
    fn test_sweep_keeps_recent_finished_jobs() {
        let store = store();
        store.create("done");
        store.start("done", 10);
        store.succeed("done");

        store.sweep();

        assert_eq!(store.job_count(), 1);
        assert_eq!(store.snapshot("done").status, JobStatus::Succeeded);
    }

    #[test]
    fn test_capacity_evicts_oldest_finished_jobs() {
        let store = ProgressStore::new(ProgressStoreConfig {
            max_jobs: 10,
            ..ProgressStoreConfig::default()
        });

        store.create("old-done");
        store.start("old-done", 1);
        store.succeed("old-done");

        for i in 0..9 {
            let id = format!("job-{}", i);
            store.create(&id);
            store.start(&id, 1);
        }
        assert_eq!(store.job_count(), 10);

        store.create("new-job");

        assert_eq!(store.job_count(), 10);
        assert_eq!(store.snapshot("old-done").total, 0);
        assert_eq!(store.snapshot("new-job").status, JobStatus::Pending);
    }

    #[test]
    fn test_capacity_never_evicts_running_jobs() {
        let store = ProgressStore::new(ProgressStoreConfig {
            max_jobs: 5,
            ..ProgressStoreConfig::default()
        });

        for i in 0..5 {
            let id = format!("job-{}", i);
            store.create(&id);
            store.start(&id, 1);
        }

        store.create("overflow");

        // Nothing was evictable, the new job is still tracked on top
        assert_eq!(store.job_count(), 6);
        for i in 0..5 {
            assert_eq!(store.snapshot(&format!("job-{}", i)).total, 1);
        }
    }

    #[tokio::test]
    async fn test_retention_sweeper_stops_on_shutdown() {
        let store = Arc::new(ProgressStore::new(ProgressStoreConfig {
            sweep_interval: Duration::from_millis(10),
            ..ProgressStoreConfig::default()
        }));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = spawn_retention_sweeper(store, shutdown_rx);
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_retention_sweeper_drops_expired_jobs() {
        let store = Arc::new(ProgressStore::new(ProgressStoreConfig {
            retention: Duration::from_secs(0),
            sweep_interval: Duration::from_millis(10),
            ..ProgressStoreConfig::default()
        }));

        store.create("done");
        store.start("done", 1);
        store.succeed("done");

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_retention_sweeper(Arc::clone(&store), shutdown_rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.job_count(), 0);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }
}
