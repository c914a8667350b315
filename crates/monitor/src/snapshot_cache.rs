use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use auditdock_core::snapshot::JobSnapshot;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::fetcher::{FetchError, JobFetcher};

/// Completion of one background snapshot fetch, delivered back to the
/// monitor task as a message.
#[derive(Debug)]
pub struct SnapshotUpdate {
    pub job_id: String,
    pub result: Result<JobSnapshot, FetchError>,
}

struct CacheEntry {
    snapshot: Option<JobSnapshot>,
    fetched_at: Option<Instant>,
    in_flight: bool,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            snapshot: None,
            fetched_at: None,
            in_flight: false,
        }
    }

    fn is_stale(&self, freshness: Duration) -> bool {
        match self.fetched_at {
            Some(at) => at.elapsed() >= freshness,
            None => true,
        }
    }
}

/// Keyed cache of job snapshots with bounded staleness.
///
/// `get` never blocks: it returns whatever is cached right now and, if
/// the entry is stale, spawns one background fetch whose completion
/// arrives as a [`SnapshotUpdate`] on the channel handed to `new`. At
/// most one fetch per job id is in flight at a time.
pub struct SnapshotCache {
    fetcher: Arc<dyn JobFetcher>,
    entries: HashMap<String, CacheEntry>,
    freshness: Duration,
    updates_tx: mpsc::Sender<SnapshotUpdate>,
}

impl SnapshotCache {
    pub fn new(
        fetcher: Arc<dyn JobFetcher>,
        freshness: Duration,
        updates_tx: mpsc::Sender<SnapshotUpdate>,
    ) -> Self {
        Self {
            fetcher,
            entries: HashMap::new(),
            freshness,
            updates_tx,
        }
    }

    /// Current snapshot for `job_id`, stale or not. Triggers a refresh
    /// in the background when the cached value is missing or older than
    /// the freshness window.
    pub fn get(&mut self, job_id: &str) -> Option<&JobSnapshot> {
        let entry = self
            .entries
            .entry(job_id.to_string())
            .or_insert_with(CacheEntry::empty);

        if entry.is_stale(self.freshness) && !entry.in_flight {
            entry.in_flight = true;
            let fetcher = self.fetcher.clone();
            let updates_tx = self.updates_tx.clone();
            let job_id = job_id.to_string();
            tokio::spawn(async move {
                let result = fetcher.fetch_job(&job_id).await;
                let _ = updates_tx.send(SnapshotUpdate { job_id, result }).await;
            });
        }

        entry.snapshot.as_ref()
    }

    /// Apply a fetch completion. Returns true when the cached value
    /// changed. Results for evicted jobs are dropped; a failed fetch
    /// leaves the previous value (if any) untouched and is not a cache
    /// update, so callers must not recompute on it (the next event
    /// append retries the fetch).
    pub fn apply(&mut self, update: SnapshotUpdate) -> bool {
        let Some(entry) = self.entries.get_mut(&update.job_id) else {
            debug!(job_id = %update.job_id, "dropping snapshot for evicted job");
            return false;
        };
        entry.in_flight = false;
        match update.result {
            Ok(snapshot) => {
                entry.snapshot = Some(snapshot);
                entry.fetched_at = Some(Instant::now());
                true
            }
            Err(e) => {
                warn!(job_id = %update.job_id, error = %e, "snapshot fetch failed");
                false
            }
        }
    }

    pub fn evict(&mut self, job_id: &str) {
        self.entries.remove(job_id);
    }

    /// Drop every entry whose job id is not in `keep`. Jobs that fell
    /// out of the active set get refetched if they ever come back.
    pub fn retain_jobs(&mut self, keep: &std::collections::HashSet<String>) {
        self.entries.retain(|job_id, _| keep.contains(job_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditdock_core::types::{JobStatus, ScanMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot(id: &str) -> JobSnapshot {
        JobSnapshot {
            id: id.into(),
            target_url: "https://example.com".into(),
            mode: ScanMode::Site,
            status: JobStatus::Running,
            pages_total: Some(10),
            pages_finished: 1,
            issues_summary: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Counts calls and never resolves, to observe coalescing.
    struct HangingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl JobFetcher for HangingFetcher {
        async fn fetch_job(&self, _job_id: &str) -> Result<JobSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    struct OkFetcher;

    #[async_trait::async_trait]
    impl JobFetcher for OkFetcher {
        async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, FetchError> {
            Ok(snapshot(job_id))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn get_coalesces_in_flight_fetches() {
        let fetcher = Arc::new(HangingFetcher {
            calls: AtomicUsize::new(0),
        });
        let (tx, _rx) = mpsc::channel(8);
        let mut cache = SnapshotCache::new(fetcher.clone(), Duration::from_secs(5), tx);

        assert!(cache.get("job-1").is_none());
        assert!(cache.get("job-1").is_none());
        // Let the spawned fetch tasks start.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_snapshot_skips_refetch_until_window_passes() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut cache = SnapshotCache::new(Arc::new(OkFetcher), Duration::from_secs(5), tx);

        assert!(cache.get("job-1").is_none());
        let update = rx.recv().await.unwrap();
        cache.apply(update);
        assert!(cache.get("job-1").is_some());

        // Within the window: no new fetch was spawned.
        tokio::time::sleep(Duration::from_secs(1)).await;
        cache.get("job-1");
        assert!(rx.try_recv().is_err());

        // Past the window: stale value still served, refresh spawned.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(cache.get("job-1").is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_previous_value() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut cache = SnapshotCache::new(Arc::new(OkFetcher), Duration::from_secs(5), tx);

        cache.get("job-1");
        let update = rx.recv().await.unwrap();
        cache.apply(update);

        cache.apply(SnapshotUpdate {
            job_id: "job-1".into(),
            result: Err(FetchError::Network("connection reset".into())),
        });
        assert!(cache.get("job-1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_for_evicted_job_is_dropped() {
        let (tx, _rx) = mpsc::channel(8);
        let mut cache = SnapshotCache::new(Arc::new(OkFetcher), Duration::from_secs(5), tx);

        cache.get("job-1");
        cache.evict("job-1");
        cache.apply(SnapshotUpdate {
            job_id: "job-1".into(),
            result: Ok(snapshot("job-1")),
        });
        // The entry was not recreated by the stale completion.
        assert!(!cache.entries.contains_key("job-1"));
    }
}
