use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JobStatus, ScanMode};

/// Full point-in-time record of a scan job, as fetched from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub target_url: String,
    pub mode: ScanMode,
    pub status: JobStatus,
    /// Unknown until crawl sizing completes.
    #[serde(default)]
    pub pages_total: Option<u64>,
    #[serde(default)]
    pub pages_finished: u64,
    /// Absent until the issue report has been computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues_summary: Option<IssuesSummary>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate issue counts for a finished (or partially finished) scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuesSummary {
    pub errors: u64,
    pub warnings: u64,
    pub notices: u64,
}

impl IssuesSummary {
    pub fn total(&self) -> u64 {
        self.errors + self.warnings + self.notices
    }
}
