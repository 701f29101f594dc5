//! Per-campaign monitor and dead-letter recovery endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use promoforge_core::{CampaignId, EventId};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:id/monitor", get(monitor))
        .route("/:id/resume", post(resume))
        .route("/events/:event_id/retry", post(retry_event))
}

fn parse_campaign_id(raw: &str) -> Result<CampaignId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid campaign id")
    })
}

/// GET /campaigns/:id/monitor — composite operator report.
pub async fn monitor(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.monitoring.campaign_monitor(campaign_id).await {
        Ok(Some(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "campaign not found"),
        Err(e) => errors::monitoring_error_to_response(e),
    }
}

/// POST /campaigns/:id/resume — replay all dead-letter events for the
/// campaign. Not idempotent at the side-effect level; operator-gated.
pub async fn resume(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.recovery.resume(campaign_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::recovery_error_to_response(e),
    }
}

/// POST /campaigns/events/:event_id/retry — replay one dead-letter event.
pub async fn retry_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    let event_id: EventId = match event_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id");
        }
    };

    match services.recovery.retry_event(event_id).await {
        Ok(new_event_id) => (
            StatusCode::OK,
            Json(serde_json::json!({ "replayed_as": new_event_id })),
        )
            .into_response(),
        Err(e) => errors::recovery_error_to_response(e),
    }
}
