//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use logsearch_api::routes;
use logsearch_api::state::AppState;
use logsearch_store::schema::SchemaManager;
use logsearch_store::store::LogStore;
use logsearch_test_support::FixedClock;

pub const AUDIT_TOKEN: &str = "audit-secret";
pub const QUERY_TOKEN: &str = "query-secret";

/// Timestamp the test clock is pinned to.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
}

/// Builds the production router over `pool` with a fixed clock and the
/// test tokens. Uses the same assembly as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let state = AppState::new(
        LogStore::new(pool),
        Arc::new(FixedClock(test_now())),
        AUDIT_TOKEN.to_string(),
        QUERY_TOKEN.to_string(),
    );
    routes::router(state)
}

/// Router over a lazy pool, for tests that never reach the database.
pub fn lazy_app() -> Router {
    let pool = PgPool::connect_lazy("postgres://localhost/test").unwrap();
    build_test_app(pool)
}

/// Creates the tables and applies every migration, with the spawned
/// backfill silenced so tests stay deterministic.
pub async fn prepare_database(pool: &PgPool) {
    let schema = SchemaManager::new(pool.clone());
    schema.init_tables(test_now()).await.unwrap();
    let silenced = CancellationToken::new();
    silenced.cancel();
    schema.run_migrations(&silenced).await.unwrap();
    schema.create_indices().await.unwrap();
}

/// Sends `body` to `uri` with `method`, returning status and raw body.
pub async fn send(app: Router, method: &str, uri: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, bytes.to_vec())
}

/// POSTs `body` to `uri`.
pub async fn post(app: Router, uri: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
    send(app, "POST", uri, body).await
}

/// GETs `uri`, returning status and raw body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, "GET", uri, Vec::new()).await
}

/// GETs `uri` and decodes the body as JSON.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    let json = serde_json::from_slice(&body).unwrap();
    (status, json)
}

/// Ingest URI carrying `token`.
pub fn ingest_uri(token: &str) -> String {
    format!("/api/ingest?token={token}")
}

/// Query URI carrying `token` plus `extra` parameters (`&`-prefixed).
pub fn query_uri(token: &str, extra: &str) -> String {
    format!("/api/query?token={token}{extra}")
}
