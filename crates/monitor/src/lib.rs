pub mod dock;
pub mod event_log;
pub mod fetcher;
pub mod monitor;
pub mod resolver;
pub mod snapshot_cache;

pub use dock::{DockItem, DockView};
pub use fetcher::{FetchError, JobFetcher};
pub use monitor::{JobMonitor, MonitorConfig, MonitorHandle};
