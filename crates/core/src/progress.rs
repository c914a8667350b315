use crate::event::ScanEvent;
use crate::snapshot::JobSnapshot;
use crate::types::{EventKind, JobStatus};

/// Project a completion percentage for one job from its most recent
/// event and (optionally) its fetched snapshot.
///
/// Precedence:
/// 1. no snapshot, or no usable `pages_total` → 0
/// 2. a `page_completed` event: the payload count wins over the
///    snapshot count (the event is presumed fresher), snapshot count as
///    fallback
/// 3. snapshot status `completed` → 100, regardless of page counts
/// 4. otherwise the snapshot's own `pages_finished / pages_total`
///
/// The result is always in [0, 100]. It is NOT monotonic across calls
/// for the same job: a snapshot refresh can report fewer finished pages
/// than an earlier event payload. Callers that need a non-regressing
/// display keep their own high-water mark (see the monitor crate).
pub fn project_progress(event: &ScanEvent, snapshot: Option<&JobSnapshot>) -> u8 {
    let Some(snap) = snapshot else {
        return 0;
    };
    let Some(total) = snap.pages_total.filter(|t| *t > 0) else {
        return 0;
    };

    if event.kind == EventKind::PageCompleted {
        let finished = event.pages_finished().unwrap_or(snap.pages_finished);
        return ratio_percent(finished, total);
    }

    if snap.status == JobStatus::Completed {
        return 100;
    }

    ratio_percent(snap.pages_finished, total)
}

fn ratio_percent(finished: u64, total: u64) -> u8 {
    let pct = (finished as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}
