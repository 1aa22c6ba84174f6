//! Liveness probe.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;

use crate::state::AppState;

/// GET /status
///
/// Answers 200 with an empty body whenever the process is up. Never
/// touches the database.
async fn status() -> StatusCode {
    StatusCode::OK
}

#[must_use]
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}
