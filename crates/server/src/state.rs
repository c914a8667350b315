use auditdock_monitor::MonitorHandle;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
}
