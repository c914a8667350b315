//! Subscription to the scan engine's SSE lifecycle feed.

use std::time::Duration;

use auditdock_core::event::ScanEvent;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// SSE event name the engine uses for lifecycle events; everything else
/// (heartbeats, keep-alive comments) is skipped.
const EVENT_NAME: &str = "scan_event";
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("network error: {0}")]
    Network(String),
    #[error("engine returned {0}")]
    Engine(reqwest::StatusCode),
}

/// Consume the engine's event stream and forward decoded events.
///
/// Runs until the receiving half of `tx` is dropped (dock teardown).
/// Transport failures reconnect after a fixed delay; the monitor keeps
/// serving last-known state in the meantime.
pub async fn subscribe_events(base_url: String, tx: mpsc::Sender<ScanEvent>) {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/events", base_url.trim_end_matches('/'));

    loop {
        let result = stream_events(&client, &url, &tx).await;
        if tx.is_closed() {
            debug!("event consumer gone, stopping subscription");
            return;
        }
        match result {
            Ok(()) => info!("event stream ended, reconnecting"),
            Err(e) => warn!(error = %e, "event stream failed, reconnecting"),
        }
        tokio::select! {
            _ = tx.closed() => {
                debug!("event consumer gone, stopping subscription");
                return;
            }
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

async fn stream_events(
    client: &reqwest::Client,
    url: &str,
    tx: &mpsc::Sender<ScanEvent>,
) -> Result<(), SubscribeError> {
    let resp = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| SubscribeError::Network(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(SubscribeError::Engine(resp.status()));
    }
    debug!(url = %url, "event stream connected");

    let mut stream = resp.bytes_stream();
    let mut parser = SseParser::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SubscribeError::Network(e.to_string()))?;
        for frame in parser.push(&chunk) {
            if frame.event.as_deref() != Some(EVENT_NAME) {
                continue;
            }
            match serde_json::from_str::<ScanEvent>(&frame.data) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Err(e) => warn!(error = %e, "skipping undecodable event frame"),
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

/// Minimal incremental parser for `text/event-stream` framing: `event:`
/// and `data:` fields, blank-line dispatch, `:` comment lines ignored.
#[derive(Default)]
struct SseParser {
    buf: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every frame completed by it.
    /// Chunks may split lines and frames arbitrarily.
    fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            self.take_line(line.trim_end_matches(['\r', '\n']), &mut frames);
        }
        frames
    }

    fn take_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            if self.event.is_some() || !self.data.is_empty() {
                frames.push(SseFrame {
                    event: self.event.take(),
                    data: std::mem::take(&mut self.data).join("\n"),
                });
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.strip_prefix(' ').unwrap_or(value).to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // id: and retry: fields are not used by this consumer.
    }
}
