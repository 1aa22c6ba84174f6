//! Audit-record ingestion.

use axum::Router;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::routing::any;
use tracing::{instrument, warn};

use logsearch_store::error::StoreError;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest accepted audit-record body.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// POST /api/ingest
///
/// Accepts one JSON audit record per request and answers 200 with an
/// empty body once it is durably stored. The route is bound to every
/// method so a non-POST request gets the endpoint's own 400 instead of
/// the router's 405.
#[instrument(skip(state, request), fields(method = %request.method()))]
async fn ingest(
    State(state): State<AppState>,
    request: Request,
) -> Result<StatusCode, ApiError> {
    if request.method() != Method::POST {
        return Err(ApiError::IngestMethod);
    }

    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::BodyRead)?;

    state.store.insert(&body).await.map_err(|err| {
        match &err {
            StoreError::Parse(_) => warn!(error = %err, "rejected malformed audit record"),
            _ => tracing::error!(error = %err, "audit record insert failed"),
        }
        ApiError::from(err)
    })?;

    Ok(StatusCode::OK)
}

#[must_use]
pub fn router() -> Router<AppState> {
    Router::new().route("/api/ingest", any(ingest))
}
