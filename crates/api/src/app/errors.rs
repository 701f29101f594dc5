use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use promoforge_infra::monitoring::MonitoringError;
use promoforge_infra::recovery::RecoveryError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn monitoring_error_to_response(err: MonitoringError) -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "monitoring_error",
        err.to_string(),
    )
}

pub fn recovery_error_to_response(err: RecoveryError) -> axum::response::Response {
    match err {
        RecoveryError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        RecoveryError::NotDeadLetter(_) => {
            json_error(StatusCode::BAD_REQUEST, "not_dead_letter", err.to_string())
        }
        RecoveryError::MalformedPayload { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "malformed_payload",
            err.to_string(),
        ),
        RecoveryError::Republish(_) => {
            json_error(StatusCode::BAD_GATEWAY, "republish_failed", err.to_string())
        }
        RecoveryError::Storage(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            err.to_string(),
        ),
    }
}
