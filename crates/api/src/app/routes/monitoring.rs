//! Monitoring endpoints: health snapshots and stuck-campaign tooling.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/health/queue", get(queue_health))
        .route("/health/system", get(system_health))
        .route("/campaigns/stuck", get(stuck_campaigns))
        .route("/campaigns/stuck/process", post(process_stuck))
        .route("/events/stream", get(event_stream))
}

/// GET /monitoring/events/stream — live SSE feed of published events.
pub async fn event_stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let envelope = msg.ok()?;
        let event = SseEvent::default()
            .event(envelope.event_type().to_string())
            .json_data(&envelope)
            .ok()?;
        Some(Ok::<_, Infallible>(event))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /monitoring/health/queue — scheduler queue snapshot.
pub async fn queue_health(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let health = services.monitoring.queue_health().await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

/// GET /monitoring/health/system — store/queue/engine snapshot.
pub async fn system_health(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let health = services.monitoring.system_health().await;
    let status = if health.store_ok && health.queue_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

/// GET /monitoring/campaigns/stuck — campaigns overdue past the threshold.
pub async fn stuck_campaigns(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.monitoring.stuck_campaigns(Utc::now()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({ "data": report })),
        )
            .into_response(),
        Err(e) => errors::monitoring_error_to_response(e),
    }
}

/// POST /monitoring/campaigns/stuck/process — re-arm close jobs for stuck
/// campaigns. Safe to repeat; arming is duplicate-suppressed.
pub async fn process_stuck(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.monitoring.process_stuck(Utc::now()).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::monitoring_error_to_response(e),
    }
}
