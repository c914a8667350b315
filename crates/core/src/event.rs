use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EventKind;

/// One lifecycle event from the scan engine's push channel.
///
/// Events are immutable once emitted. They are causally ordered per job
/// at emission time, but the client may receive them out of order or
/// more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Opaque sequence identifier, unique within one job's stream.
    pub id: String,
    pub job_id: String,
    pub kind: EventKind,
    /// Emission timestamp (server clock).
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

/// Structured data attached to some event kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// For `page_completed`: pages finished so far, as known to the
    /// emitter at event time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_finished: Option<u64>,
}

impl ScanEvent {
    /// Pages-finished count carried by this event, if any.
    pub fn pages_finished(&self) -> Option<u64> {
        self.payload.as_ref().and_then(|p| p.pages_finished)
    }
}
