//! Route handlers and router assembly.

pub mod ingest;
pub mod query;
pub mod status;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::auth;
use crate::state::AppState;

/// Assembles the full service router.
///
/// The liveness probe stays outside the auth layers; the ingest and
/// query routes each sit behind their own token.
#[must_use]
pub fn router(state: AppState) -> Router {
    let ingest = ingest::router().layer(from_fn_with_state(
        state.clone(),
        auth::require_audit_token,
    ));
    let query = query::router().layer(from_fn_with_state(
        state.clone(),
        auth::require_query_token,
    ));

    Router::new()
        .merge(status::router())
        .merge(ingest)
        .merge(query)
        .with_state(state)
}
