//! Echo endpoint: stamps arrival/departure times on ingested events, echoes the
//! caption back, and keeps the single most recent event for `GET /status`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use latency_probe_common::clock::{Clock, SystemClock};
use latency_probe_common::event::{IngestRequest, IngestResponse, StatusResponse, StoredEvent};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Most recently ingested event. Replaced whole under the lock, so a
    /// status read never sees a half-written event.
    last_event: Mutex<Option<StoredEvent>>,
    clock: Arc<dyn Clock>,
    processing_delay: Duration,
}

impl AppState {
    pub fn new(clock: Arc<dyn Clock>, processing_delay: Duration) -> Self {
        Self {
            last_event: Mutex::new(None),
            clock,
            processing_delay,
        }
    }

    pub fn with_system_clock(processing_delay: Duration) -> Self {
        Self::new(Arc::new(SystemClock), processing_delay)
    }

    pub async fn last_event(&self) -> Option<StoredEvent> {
        self.last_event.lock().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid ingest payload: {0}")]
    Validation(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /ingest
/// Body: { "sent_ts": 1.0, "caption": "...", "aux": { "brightness": 1.0 } | null }
async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected ingest payload");
        ApiError::from(rejection)
    })?;

    let server_recv_ts = state.clock.now();
    if !state.processing_delay.is_zero() {
        tokio::time::sleep(state.processing_delay).await;
    }
    let server_send_ts = state.clock.now();

    let event = StoredEvent::stamp(request, server_recv_ts, server_send_ts);
    let response = event.echo();

    debug!(
        caption = event.caption,
        sent_ts = event.sent_ts,
        server_recv_ts = event.server_recv_ts,
        server_send_ts = event.server_send_ts,
        "event ingested"
    );

    *state.last_event.lock().await = Some(event);
    Ok(Json(response))
}

/// GET /status
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse::from_slot(state.last_event().await))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the endpoint on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
