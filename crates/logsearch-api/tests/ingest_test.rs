//! Ingest endpoint tests: authentication, method handling, and the
//! write path through to search.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

use common::{
    AUDIT_TOKEN, QUERY_TOKEN, build_test_app, get_json, ingest_uri, lazy_app, post,
    prepare_database, query_uri, send, test_now,
};
use logsearch_test_support::AuditRecordBuilder;

const SAMPLE_RECORD: &str = r#"{"version":"1","time":"2023-06-01T10:20:30.123456789Z","api":{"name":"GetObject","bucket":"b","object":"o","status":"OK","statusCode":200,"timeToResponse":"1500000ns"},"remotehost":"10.0.0.1","requestID":"R1","userAgent":"ua","requestHeader":{"Content-Length":"0"},"responseHeader":{"Content-Length":"42"}}"#;

// --- authentication ---

#[tokio::test]
async fn test_missing_token_is_403_with_empty_body() {
    let body = AuditRecordBuilder::new(test_now()).build_bytes();

    let (status, response) = post(lazy_app(), "/api/ingest", body).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_wrong_token_is_403_with_empty_body() {
    let body = AuditRecordBuilder::new(test_now()).build_bytes();

    let (status, response) = post(lazy_app(), &ingest_uri("wrong-token"), body).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_query_token_does_not_open_ingest() {
    let body = AuditRecordBuilder::new(test_now()).build_bytes();

    let (status, _) = post(lazy_app(), &ingest_uri(QUERY_TOKEN), body).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

// --- method and body handling ---

#[tokio::test]
async fn test_non_post_method_is_400_with_error_body() {
    for method in ["GET", "PUT", "DELETE", "PATCH"] {
        let (status, response) =
            send(lazy_app(), method, &ingest_uri(AUDIT_TOKEN), Vec::new()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
        let parsed: serde_json::Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(parsed["error"], "bad_request", "{method}");
    }
}

#[tokio::test]
async fn test_token_is_checked_before_the_method() {
    let (status, response) =
        send(lazy_app(), "DELETE", &ingest_uri("wrong-token"), Vec::new()).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_malformed_record_is_500() {
    let (status, _) = post(lazy_app(), &ingest_uri(AUDIT_TOKEN), b"not json".to_vec()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_record_missing_required_fields_is_500() {
    let (status, _) = post(
        lazy_app(),
        &ingest_uri(AUDIT_TOKEN),
        br#"{"version":"1"}"#.to_vec(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// --- write path ---

#[sqlx::test]
async fn test_ingest_round_trip(pool: PgPool) {
    prepare_database(&pool).await;
    let app = build_test_app(pool);

    let (status, response) = post(
        app.clone(),
        &ingest_uri(AUDIT_TOKEN),
        SAMPLE_RECORD.as_bytes().to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.is_empty());

    let uri = query_uri(QUERY_TOKEN, "&q=reqinfo&timeStart=2023-06-01T11:00:00Z");
    let (status, rows) = get_json(app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["api_name"], "GetObject");
    assert_eq!(rows[0]["time_to_response_ns"], 1_500_000);
    assert_eq!(rows[0]["request_content_length"], 0);
    assert_eq!(rows[0]["response_content_length"], 42);
    assert_eq!(rows[0]["request_id"], "R1");
}

#[sqlx::test]
async fn test_raw_flavour_returns_the_verbatim_record(pool: PgPool) {
    prepare_database(&pool).await;
    let app = build_test_app(pool);

    post(
        app.clone(),
        &ingest_uri(AUDIT_TOKEN),
        SAMPLE_RECORD.as_bytes().to_vec(),
    )
    .await;

    let uri = query_uri(QUERY_TOKEN, "&q=raw&timeStart=2023-06-01T11:00:00Z");
    let (status, rows) = get_json(app, &uri).await;

    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    // The log column comes back as a JSON object, not an escaped string.
    assert_eq!(rows[0]["log"]["requestID"], "R1");
    assert_eq!(rows[0]["log"]["api"]["bucket"], "b");
}

#[sqlx::test]
async fn test_empty_object_is_a_no_op(pool: PgPool) {
    prepare_database(&pool).await;
    let app = build_test_app(pool);

    let (status, response) = post(app.clone(), &ingest_uri(AUDIT_TOKEN), b"{}".to_vec()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.is_empty());

    let uri = query_uri(QUERY_TOKEN, "&q=reqinfo");
    let (status, rows) = get_json(app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[sqlx::test]
async fn test_rejected_ingest_writes_nothing(pool: PgPool) {
    prepare_database(&pool).await;
    let app = build_test_app(pool);

    let (status, response) = post(
        app.clone(),
        &ingest_uri("wrong-token"),
        SAMPLE_RECORD.as_bytes().to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(response.is_empty());

    let uri = query_uri(QUERY_TOKEN, "&q=reqinfo");
    let (_, rows) = get_json(app, &uri).await;
    assert_eq!(rows.as_array().unwrap().len(), 0);
}
