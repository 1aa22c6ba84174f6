//! Token authentication for the ingest and query surfaces.
//!
//! Both endpoints expect a `token` query parameter. Comparison runs in
//! constant time so response latency does not narrow down the token one
//! byte at a time. Every failure maps to the same empty 403.

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Query-string shape both middlewares extract; only `token` is read,
/// other parameters pass through untouched.
#[derive(Debug, Deserialize)]
pub struct TokenParam {
    token: Option<String>,
}

/// Gates `/api/ingest` behind the audit token.
///
/// # Errors
/// Returns [`ApiError::Forbidden`] when the token is absent or wrong.
pub async fn require_audit_token(
    State(state): State<AppState>,
    Query(params): Query<TokenParam>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !authorized(params.token.as_deref(), &state.audit_token) {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Gates `/api/query` behind the query token.
///
/// # Errors
/// Returns [`ApiError::Forbidden`] when the token is absent or wrong.
pub async fn require_query_token(
    State(state): State<AppState>,
    Query(params): Query<TokenParam>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !authorized(params.token.as_deref(), &state.query_token) {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

fn authorized(presented: Option<&str>, expected: &str) -> bool {
    let Some(token) = presented else {
        tracing::debug!("rejected request without a token");
        return false;
    };
    if token.as_bytes().ct_eq(expected.as_bytes()).into() {
        true
    } else {
        tracing::debug!("rejected request with an invalid token");
        false
    }
}

// --- tests ---
