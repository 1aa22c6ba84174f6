//! Paginated audit-log search.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::instrument;

use logsearch_store::search::{SearchParams, SearchQuery};
use logsearch_store::store::SearchResults;

use crate::error::ApiError;
use crate::state::AppState;

/// Raw `/api/query` parameters.
///
/// Everything arrives as an optional string; validation happens in
/// [`SearchQuery::build`] so the rules live next to the SQL they shape.
/// `timeAsc` and `timeDesc` are presence flags and their values are
/// ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    q: Option<String>,
    time_start: Option<String>,
    time_asc: Option<String>,
    time_desc: Option<String>,
    page_size: Option<String>,
    page_no: Option<String>,
}

impl From<QueryParams> for SearchParams {
    fn from(params: QueryParams) -> Self {
        Self {
            q: params.q,
            time_start: params.time_start,
            time_asc: params.time_asc.is_some(),
            time_desc: params.time_desc.is_some(),
            page_size: params.page_size,
            page_no: params.page_no,
        }
    }
}

/// GET /api/query
///
/// Validates the parameters, runs one page of the search, and returns
/// the rows as a JSON array.
#[instrument(skip(state))]
async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let search = SearchQuery::build(&SearchParams::from(params), state.clock.now())?;

    let results = state.store.search(&search).await.map_err(|err| {
        tracing::error!(error = %err, "search failed");
        ApiError::from(err)
    })?;

    tracing::debug!(rows = results.len(), "search complete");
    Ok(Json(results))
}

#[must_use]
pub fn router() -> Router<AppState> {
    Router::new().route("/api/query", get(query))
}
