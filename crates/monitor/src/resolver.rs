use auditdock_core::event::ScanEvent;
use auditdock_core::snapshot::JobSnapshot;
use tracing::debug;

use crate::event_log::EventLog;
use crate::snapshot_cache::SnapshotCache;

/// One job still considered in flight: its latest received event,
/// paired with the fetched snapshot when one is loaded.
#[derive(Debug, Clone)]
pub struct ActiveSetEntry {
    pub event: ScanEvent,
    pub snapshot: Option<JobSnapshot>,
}

/// Merge the event-derived job list with snapshot truth.
///
/// A job is kept while its snapshot is absent (optimistically assumed
/// active) or non-terminal. The event stream and the snapshot API can
/// each lag the other, so the union of their terminal signals decides
/// removal: a snapshot that reports terminal status latches the job
/// terminal in the log and evicts the cache entry, which also stops a
/// later "snapshot absent" pass from resurrecting it.
///
/// Pure with respect to external inputs: safe to rerun on every event
/// append or snapshot update. Reading through the cache is what
/// schedules the background fetches.
pub fn resolve_active_set(
    log: &mut EventLog,
    cache: &mut SnapshotCache,
    cap: usize,
) -> Vec<ActiveSetEntry> {
    let mut entries = Vec::with_capacity(cap);

    for event in log.recent_events(cap) {
        let snapshot = cache.get(&event.job_id).cloned();

        if let Some(snap) = &snapshot {
            if snap.status.is_terminal() {
                debug!(job_id = %event.job_id, status = %snap.status, "snapshot reports terminal status");
                log.mark_terminal(&event.job_id);
                cache.evict(&event.job_id);
                continue;
            }
        }

        entries.push(ActiveSetEntry { event, snapshot });
    }

    entries
}
