use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let engine_url = std::env::var("AUDITDOCK_ENGINE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8600".to_string());
    let dock_cap: usize = std::env::var("AUDITDOCK_DOCK_CAP")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let freshness_secs: u64 = std::env::var("AUDITDOCK_FRESHNESS_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    info!(engine_url = %engine_url, "subscribing to scan engine");

    // Push channel: engine SSE feed -> monitor.
    let (events_tx, events_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(auditdock_client::subscribe_events(
        engine_url.clone(),
        events_tx,
    ));

    let fetcher = Arc::new(auditdock_client::EngineClient::new(engine_url));
    let monitor = auditdock_monitor::JobMonitor::spawn(
        fetcher,
        events_rx,
        auditdock_monitor::MonitorConfig {
            dock_cap,
            freshness: Duration::from_secs(freshness_secs),
        },
    );

    let app_state = auditdock_server::state::AppState { monitor };
    let app = auditdock_server::routes::build_router(app_state);

    let bind_addr = std::env::var("AUDITDOCK_BIND").unwrap_or_else(|_| "0.0.0.0:8700".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %bind_addr, "auditdock listening");

    axum::serve(listener, app).await?;
    Ok(())
}
