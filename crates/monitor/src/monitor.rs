use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use auditdock_core::event::ScanEvent;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::dock::{DockPresenter, DockView};
use crate::event_log::EventLog;
use crate::fetcher::JobFetcher;
use crate::resolver;
use crate::snapshot_cache::{SnapshotCache, SnapshotUpdate};

/// Tunables for one monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Display cap: at most this many jobs in the dock.
    pub dock_cap: usize,
    /// Maximum age at which a cached snapshot is reused without a
    /// refetch.
    pub freshness: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dock_cap: 5,
            freshness: Duration::from_secs(5),
        }
    }
}

enum Command {
    SetExpanded(bool),
}

/// Handle to a running [`JobMonitor`] task. Cheap to clone; dropping
/// the last handle shuts the monitor down.
#[derive(Clone)]
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<DockView>,
}

impl MonitorHandle {
    /// Latest published dock view.
    pub fn view(&self) -> DockView {
        self.view_rx.borrow().clone()
    }

    /// Watch receiver for re-emitting the view on every change.
    pub fn subscribe(&self) -> watch::Receiver<DockView> {
        self.view_rx.clone()
    }

    /// Toggle the dock's expanded/minimized state. Returns false if the
    /// monitor is gone.
    pub async fn set_expanded(&self, expanded: bool) -> bool {
        self.cmd_tx
            .send(Command::SetExpanded(expanded))
            .await
            .is_ok()
    }
}

/// The actor owning all monitoring state for one dock lifetime:
/// the event log, the snapshot cache and the presenter. Constructed per
/// dock mount; every state access happens on its task, so there are no
/// locks. Snapshot fetches run as spawned tasks and come back as
/// messages.
pub struct JobMonitor {
    log: EventLog,
    cache: SnapshotCache,
    presenter: DockPresenter,
    config: MonitorConfig,
    events_rx: mpsc::Receiver<ScanEvent>,
    events_open: bool,
    updates_rx: mpsc::Receiver<SnapshotUpdate>,
    cmd_rx: mpsc::Receiver<Command>,
    view_tx: watch::Sender<DockView>,
}

impl JobMonitor {
    pub fn spawn(
        fetcher: Arc<dyn JobFetcher>,
        events_rx: mpsc::Receiver<ScanEvent>,
        config: MonitorConfig,
    ) -> MonitorHandle {
        let (updates_tx, updates_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (view_tx, view_rx) = watch::channel(DockView::default());

        let monitor = Self {
            log: EventLog::new(),
            cache: SnapshotCache::new(fetcher, config.freshness, updates_tx),
            presenter: DockPresenter::new(),
            config,
            events_rx,
            events_open: true,
            updates_rx,
            cmd_rx,
            view_tx,
        };
        tokio::spawn(monitor.run());

        MonitorHandle { cmd_tx, view_rx }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_event = self.events_rx.recv(), if self.events_open => {
                    match maybe_event {
                        Some(event) => {
                            debug!(job_id = %event.job_id, kind = %event.kind, "scan event received");
                            self.log.append(event);
                            self.publish();
                        }
                        None => {
                            // Degrade to serving last-known state; the
                            // subscription side owns reconnection.
                            warn!("event channel closed, live updates unavailable");
                            self.events_open = false;
                        }
                    }
                }
                Some(update) = self.updates_rx.recv() => {
                    if self.log.is_terminal(&update.job_id) {
                        self.cache.evict(&update.job_id);
                    } else if self.cache.apply(update) {
                        self.publish();
                    }
                }
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(Command::SetExpanded(expanded)) => {
                            self.presenter.set_expanded(expanded);
                            self.publish();
                        }
                        None => {
                            debug!("all monitor handles dropped, stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Recompute the active set and publish a fresh view. Pure function
    /// of current log + cache state, run on every message.
    fn publish(&mut self) {
        let entries =
            resolver::resolve_active_set(&mut self.log, &mut self.cache, self.config.dock_cap);
        let view = self.presenter.present(entries);

        let keep: HashSet<String> = view
            .items
            .iter()
            .map(|item| item.event.job_id.clone())
            .collect();
        self.cache.retain_jobs(&keep);

        let _ = self.view_tx.send(view);
    }
}
