use auditdock_core::error::ApiError;
use auditdock_monitor::DockView;
use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/dock", get(get_dock))
        .route("/dock/events", get(sse_dock))
        .route("/dock/expanded", put(set_expanded))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Current dock view: the capped active job list with projected
/// progress, plus the badge count.
async fn get_dock(State(state): State<AppState>) -> Json<DockView> {
    Json(state.monitor.view())
}

#[derive(Deserialize)]
struct ExpandedBody {
    expanded: bool,
}

async fn set_expanded(
    State(state): State<AppState>,
    Json(body): Json<ExpandedBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.monitor.set_expanded(body.expanded).await {
        return Err(ApiError::Internal("monitor unavailable".into()).into());
    }
    Ok(Json(serde_json::json!({ "expanded": body.expanded })))
}

// ---------------------------------------------------------------------------
// SSE re-emission of the dock view
// ---------------------------------------------------------------------------

async fn sse_dock(
    State(state): State<AppState>,
) -> axum::response::Sse<
    impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>,
> {
    use axum::response::sse::Event;
    use std::time::Duration;

    let mut rx = state.monitor.subscribe();

    let stream = async_stream::stream! {
        // Emit the current view straight away so a reconnecting client
        // does not wait for the next change.
        let view = rx.borrow_and_update().clone();
        if let Ok(data) = serde_json::to_string(&view) {
            yield Ok(Event::default().event("dock").data(data));
        }
        while rx.changed().await.is_ok() {
            let view = rx.borrow_and_update().clone();
            if let Ok(data) = serde_json::to_string(&view) {
                yield Ok(Event::default().event("dock").data(data));
            }
        }
    };

    axum::response::Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
