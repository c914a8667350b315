use std::collections::HashMap;

use auditdock_core::event::ScanEvent;
use auditdock_core::progress::project_progress;
use auditdock_core::snapshot::JobSnapshot;
use serde::{Deserialize, Serialize};

use crate::resolver::ActiveSetEntry;

/// One render-ready dock row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockItem {
    pub event: ScanEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobSnapshot>,
    pub progress_percent: u8,
}

/// The full dock render contract, re-emitted on every recomputation.
/// An empty `items` list means the frontend renders no dock at all;
/// `total` is the badge count and always equals `items.len()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockView {
    pub items: Vec<DockItem>,
    pub total: usize,
    pub expanded: bool,
}

/// Turns resolved active-set entries into a [`DockView`] and owns the
/// UI-only state: the expanded flag and the per-job progress high-water
/// marks that keep the displayed percentage from regressing when the
/// snapshot source briefly undercounts a fresher event payload.
pub struct DockPresenter {
    expanded: bool,
    high_water: HashMap<String, u8>,
}

impl DockPresenter {
    pub fn new() -> Self {
        Self {
            expanded: true,
            high_water: HashMap::new(),
        }
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn present(&mut self, entries: Vec<ActiveSetEntry>) -> DockView {
        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let raw = project_progress(&entry.event, entry.snapshot.as_ref());
            let mark = self
                .high_water
                .entry(entry.event.job_id.clone())
                .or_insert(0);
            let percent = raw.max(*mark);
            *mark = percent;
            items.push(DockItem {
                event: entry.event,
                job: entry.snapshot,
                progress_percent: percent,
            });
        }

        // Marks for jobs that left the active set are dropped; a job id
        // never comes back after its terminal latch, so this cannot
        // reset a live job's floor.
        self.high_water
            .retain(|job_id, _| items.iter().any(|item| item.event.job_id == *job_id));

        DockView {
            total: items.len(),
            items,
            expanded: self.expanded,
        }
    }
}

impl Default for DockPresenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditdock_core::event::EventPayload;
    use auditdock_core::types::{EventKind, JobStatus, ScanMode};

    fn entry(job_id: &str, kind: EventKind, pages_finished: Option<u64>) -> ActiveSetEntry {
        ActiveSetEntry {
            event: ScanEvent {
                id: format!("{job_id}-{kind}"),
                job_id: job_id.into(),
                kind,
                created_at: chrono::Utc::now(),
                payload: pages_finished.map(|n| EventPayload {
                    pages_finished: Some(n),
                }),
            },
            snapshot: Some(JobSnapshot {
                id: job_id.into(),
                target_url: "https://example.com".into(),
                mode: ScanMode::Site,
                status: JobStatus::Running,
                pages_total: Some(10),
                pages_finished: 1,
                issues_summary: None,
                created_at: chrono::Utc::now(),
                started_at: None,
                completed_at: None,
            }),
        }
    }

    #[test]
    fn empty_active_set_gives_empty_view() {
        let mut presenter = DockPresenter::new();
        let view = presenter.present(Vec::new());
        assert!(view.items.is_empty());
        assert_eq!(view.total, 0);
    }

    #[test]
    fn badge_count_matches_items() {
        let mut presenter = DockPresenter::new();
        let view = presenter.present(vec![
            entry("a", EventKind::Started, None),
            entry("b", EventKind::Queued, None),
        ]);
        assert_eq!(view.total, 2);
        assert_eq!(view.items.len(), 2);
    }

    #[test]
    fn displayed_progress_never_regresses() {
        let mut presenter = DockPresenter::new();

        // Fresh event payload: 3/10 pages.
        let view = presenter.present(vec![entry("a", EventKind::PageCompleted, Some(3))]);
        assert_eq!(view.items[0].progress_percent, 30);

        // Later recomputation where the payload count is gone and the
        // stale snapshot only knows about 1/10.
        let view = presenter.present(vec![entry("a", EventKind::PageCompleted, None)]);
        assert_eq!(view.items[0].progress_percent, 30);

        // Progress still moves forward.
        let view = presenter.present(vec![entry("a", EventKind::PageCompleted, Some(6))]);
        assert_eq!(view.items[0].progress_percent, 60);
    }

    #[test]
    fn high_water_dropped_when_job_leaves() {
        let mut presenter = DockPresenter::new();
        presenter.present(vec![entry("a", EventKind::PageCompleted, Some(5))]);
        presenter.present(Vec::new());
        assert!(presenter.high_water.is_empty());
    }

    #[test]
    fn expanded_flag_flows_through() {
        let mut presenter = DockPresenter::new();
        assert!(presenter.present(Vec::new()).expanded);
        presenter.set_expanded(false);
        assert!(!presenter.present(Vec::new()).expanded);
    }
}
