//! Admin gating.
//!
//! Real authentication lives in the platform gateway; this service only
//! checks the shared operator token so the recovery/monitoring surface is
//! never exposed unauthenticated.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

#[derive(Clone)]
pub struct AdminState {
    pub token: Arc<String>,
}

pub async fn admin_middleware(
    State(state): State<AdminState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_token(req.headers())?;

    if token != state.token.as_str() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

fn extract_token(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get("x-admin-token")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
