use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use auditdock_core::event::ScanEvent;

/// Per-job record. `Terminal` is a latch: once a job has been observed
/// terminal (from either the event stream or a snapshot) it stays
/// terminal for the rest of the process lifetime, so stale replays can
/// never resurrect it into the active view.
enum JobRecord {
    Active {
        event: ScanEvent,
        /// Arrival order stamp; higher = received later.
        seq: u64,
        /// Event ids already applied for this job.
        seen: HashSet<String>,
    },
    Terminal,
}

/// Append-only buffer of lifecycle events, one record per job, ordered
/// by arrival rather than by event timestamps. The scan engine delivers
/// events at-least-once and without ordering guarantees, so appends are
/// idempotent and terminality is latched.
#[derive(Default)]
pub struct EventLog {
    jobs: HashMap<String, JobRecord>,
    next_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Duplicates (same event id for the same job) and
    /// events for already-terminal jobs are dropped.
    pub fn append(&mut self, event: ScanEvent) {
        // Unused stamps leave gaps; only relative order matters.
        let seq = self.next_seq;
        self.next_seq += 1;

        match self.jobs.entry(event.job_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let mut latch = false;
                if let JobRecord::Active {
                    event: slot,
                    seq: slot_seq,
                    seen,
                } = occupied.get_mut()
                {
                    if !seen.contains(&event.id) {
                        if event.kind.is_terminal() {
                            latch = true;
                        } else {
                            seen.insert(event.id.clone());
                            *slot = event;
                            *slot_seq = seq;
                        }
                    }
                }
                if latch {
                    occupied.insert(JobRecord::Terminal);
                }
            }
            Entry::Vacant(vacant) => {
                if event.kind.is_terminal() {
                    vacant.insert(JobRecord::Terminal);
                    return;
                }
                let mut seen = HashSet::new();
                seen.insert(event.id.clone());
                vacant.insert(JobRecord::Active { event, seq, seen });
            }
        }
    }

    /// Latch a job terminal without an event, used when a fetched
    /// snapshot reveals terminal status before the stream does.
    pub fn mark_terminal(&mut self, job_id: &str) {
        self.jobs.insert(job_id.to_string(), JobRecord::Terminal);
    }

    pub fn is_terminal(&self, job_id: &str) -> bool {
        matches!(self.jobs.get(job_id), Some(JobRecord::Terminal))
    }

    /// Up to `limit` jobs, each represented by its latest received
    /// event, newest arrival first. Terminal jobs are excluded.
    pub fn recent_events(&self, limit: usize) -> Vec<ScanEvent> {
        let mut active: Vec<(&u64, &ScanEvent)> = self
            .jobs
            .values()
            .filter_map(|record| match record {
                JobRecord::Active { event, seq, .. } => Some((seq, event)),
                JobRecord::Terminal => None,
            })
            .collect();
        active.sort_by(|a, b| b.0.cmp(a.0));
        active
            .into_iter()
            .take(limit)
            .map(|(_, ev)| ev.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditdock_core::event::EventPayload;
    use auditdock_core::types::EventKind;

    fn event(id: &str, job_id: &str, kind: EventKind) -> ScanEvent {
        ScanEvent {
            id: id.into(),
            job_id: job_id.into(),
            kind,
            created_at: chrono::Utc::now(),
            payload: None,
        }
    }

    #[test]
    fn latest_event_per_job_newest_first() {
        let mut log = EventLog::new();
        log.append(event("1", "a", EventKind::Queued));
        log.append(event("2", "b", EventKind::Queued));
        log.append(event("3", "a", EventKind::Started));

        let recent = log.recent_events(5);
        assert_eq!(recent.len(), 2);
        // Job "a" received its latest event after job "b".
        assert_eq!(recent[0].job_id, "a");
        assert_eq!(recent[0].kind, EventKind::Started);
        assert_eq!(recent[1].job_id, "b");
    }

    #[test]
    fn append_is_idempotent() {
        let mut log = EventLog::new();
        log.append(event("1", "a", EventKind::Queued));
        log.append(event("2", "b", EventKind::Queued));
        // Redelivery of job a's event must not bump it back to the front.
        log.append(event("1", "a", EventKind::Queued));

        let recent = log.recent_events(5);
        assert_eq!(recent[0].job_id, "b");
        assert_eq!(recent[1].job_id, "a");
    }

    #[test]
    fn terminal_event_removes_job() {
        let mut log = EventLog::new();
        log.append(event("1", "a", EventKind::Started));
        log.append(event("2", "a", EventKind::Completed));
        assert!(log.recent_events(5).is_empty());
        assert!(log.is_terminal("a"));
    }

    #[test]
    fn stale_replay_cannot_resurrect_terminal_job() {
        let mut log = EventLog::new();
        log.append(event("1", "a", EventKind::Started));
        log.append(event("3", "a", EventKind::Completed));
        // Out-of-order replay of an earlier page_completed event.
        let mut replay = event("2", "a", EventKind::PageCompleted);
        replay.payload = Some(EventPayload {
            pages_finished: Some(4),
        });
        log.append(replay);

        assert!(log.recent_events(5).is_empty());
        assert!(log.is_terminal("a"));
    }

    #[test]
    fn mark_terminal_latches_without_event() {
        let mut log = EventLog::new();
        log.append(event("1", "a", EventKind::Started));
        log.mark_terminal("a");
        log.append(event("2", "a", EventKind::PageCompleted));

        assert!(log.recent_events(5).is_empty());
    }

    #[test]
    fn recent_events_respects_limit() {
        let mut log = EventLog::new();
        for i in 0..6 {
            log.append(event(&format!("{i}"), &format!("job-{i}"), EventKind::Queued));
        }
        let recent = log.recent_events(5);
        assert_eq!(recent.len(), 5);
        // The five most recently appended jobs survive, oldest dropped.
        assert_eq!(recent[0].job_id, "job-5");
        assert_eq!(recent[4].job_id, "job-1");
    }

    #[test]
    fn terminal_first_event_never_activates() {
        let mut log = EventLog::new();
        log.append(event("9", "a", EventKind::Failed));
        assert!(log.recent_events(5).is_empty());
        // A late non-terminal replay stays dead too.
        log.append(event("1", "a", EventKind::Started));
        assert!(log.recent_events(5).is_empty());
    }
}
