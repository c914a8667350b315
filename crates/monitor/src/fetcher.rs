use auditdock_core::snapshot::JobSnapshot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("job not found")]
    NotFound,
}

/// A source of job snapshots. The production implementation talks to
/// the scan engine over HTTP; tests substitute a stub.
#[async_trait::async_trait]
pub trait JobFetcher: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, FetchError>;
}
