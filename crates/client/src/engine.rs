//! HTTP client for the scan engine's snapshot API.

use auditdock_core::snapshot::JobSnapshot;
use auditdock_monitor::{FetchError, JobFetcher};
use tracing::debug;

pub struct EngineClient {
    base_url: String,
    client: reqwest::Client,
}

impl EngineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl JobFetcher for EngineClient {
    async fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, FetchError> {
        let url = format!("{}/api/v1/scans/{job_id}", self.base_url);
        debug!(url = %url, "fetching job snapshot");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(FetchError::Engine(format!(
                "engine returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| FetchError::Engine(format!("parse JSON: {e}")))
    }
}
