use axum::{Router, http::StatusCode};

pub mod campaigns;
pub mod monitoring;

/// Router for all operator-gated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/monitoring", monitoring::router())
        .nest("/campaigns", campaigns::router())
}

/// GET /health — liveness probe, unauthenticated.
pub async fn health() -> StatusCode {
    StatusCode::OK
}
