//! Storage engine: transactional ingest, time-ordered search, and
//! per-partition size accounting.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgQueryResult, PgRow};
use sqlx::{FromRow, PgPool};

use logsearch_core::record;

use crate::error::{CHECK_VIOLATION, StoreError, has_sqlstate};
use crate::schema::{SchemaManager, Table};
use crate::search::{SearchQuery, SearchTarget};

/// Deadline applied to each individual database call.
pub const DB_CALL_DEADLINE: Duration = Duration::from_secs(2);

/// Disk usage per parent table: `parent -> child -> bytes`.
///
/// Child maps iterate in name order, which the date suffix makes
/// chronological.
pub type TableUsage = BTreeMap<String, BTreeMap<String, i64>>;

const INSERT_AUDIT_LOG_EVENT: &str = r"
INSERT INTO audit_log_events (event_time, log) VALUES ($1, $2);
";

const INSERT_REQUEST_INFO: &str = r"
INSERT INTO request_info (
    time, api_name, bucket, object, time_to_response_ns, remote_host,
    request_id, user_agent, response_status, response_status_code,
    request_content_length, response_content_length
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12);
";

const RAW_COLUMNS: &str = "event_time, log";

const REQUEST_INFO_COLUMNS: &str = "time, api_name, bucket, object, time_to_response_ns, \
    remote_host, request_id, user_agent, response_status, response_status_code, \
    request_content_length, response_content_length, access_key";

/// One `q=raw` result row: the timestamp and the verbatim audit record.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RawLogRow {
    pub event_time: DateTime<Utc>,
    pub log: Value,
}

/// One `q=reqinfo` result row.
///
/// The content-length fields are omitted from the JSON framing when null;
/// `access_key` serialises as an explicit null until the backfill reaches
/// the row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RequestInfoRow {
    pub time: DateTime<Utc>,
    pub api_name: String,
    pub bucket: String,
    pub object: String,
    pub time_to_response_ns: i64,
    pub remote_host: String,
    pub request_id: String,
    pub user_agent: String,
    pub response_status: String,
    pub response_status_code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_content_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_content_length: Option<i64>,
    pub access_key: Option<String>,
}

/// One page of search results.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SearchResults {
    Raw(Vec<RawLogRow>),
    ReqInfo(Vec<RequestInfoRow>),
}

impl SearchResults {
    /// Number of rows in the page.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(rows) => rows.len(),
            Self::ReqInfo(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs one database call under [`DB_CALL_DEADLINE`].
pub(crate) async fn bounded<T, F>(call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    tokio::time::timeout(DB_CALL_DEADLINE, call)
        .await
        .map_err(|_| StoreError::Timeout(DB_CALL_DEADLINE))?
        .map_err(StoreError::from)
}

/// PostgreSQL-backed storage engine.
///
/// Sole writer of audit rows. Issues no DDL; partitions and migrations
/// belong to [`SchemaManager`].
#[derive(Debug, Clone)]
pub struct LogStore {
    pool: PgPool,
}

impl LogStore {
    /// Creates a new `LogStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ingests one audit-record body.
    ///
    /// A body decoding to an empty JSON object is a successful no-op.
    /// Otherwise the verbatim document and the projected request-info row
    /// are written in one transaction; a failure leaves no partial write.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::Parse`] on a malformed record,
    /// [`StoreError::NoPartition`] when no child partition covers the
    /// record's timestamp, and [`StoreError::Timeout`] or
    /// [`StoreError::Database`] on connection trouble.
    pub async fn insert(&self, body: &[u8]) -> Result<(), StoreError> {
        let Some(event) = record::parse(body)? else {
            return Ok(());
        };
        let time = event.record.time;

        let mut tx = bounded(self.pool.begin()).await?;
        insert_row(
            sqlx::query(INSERT_AUDIT_LOG_EVENT)
                .bind(time)
                .bind(&event.document)
                .execute(&mut *tx),
            Table::AuditLogEvents,
            time,
        )
        .await?;

        let record = &event.record;
        insert_row(
            sqlx::query(INSERT_REQUEST_INFO)
                .bind(time)
                .bind(&record.api.name)
                .bind(&record.api.bucket)
                .bind(&record.api.object)
                .bind(record.api.time_to_response.0)
                .bind(&record.remote_host)
                .bind(&record.request_id)
                .bind(&record.user_agent)
                .bind(&record.api.status)
                .bind(record.api.status_code)
                .bind(record.request_content_length())
                .bind(record.response_content_length())
                .execute(&mut *tx),
            Table::RequestInfo,
            time,
        )
        .await?;

        bounded(tx.commit()).await?;
        Ok(())
    }

    /// Runs a validated search and returns one page of rows.
    ///
    /// The page is fully buffered; `MAX_PAGE_SIZE` bounds its memory. Raw
    /// rows carry the stored document as a JSON object, not an escaped
    /// string.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::Timeout`] or [`StoreError::Database`].
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, StoreError> {
        match query.target {
            SearchTarget::Raw => Ok(SearchResults::Raw(
                self.fetch_page(Table::AuditLogEvents, RAW_COLUMNS, query)
                    .await?,
            )),
            SearchTarget::ReqInfo => Ok(SearchResults::ReqInfo(
                self.fetch_page(Table::RequestInfo, REQUEST_INFO_COLUMNS, query)
                    .await?,
            )),
        }
    }

    async fn fetch_page<R>(
        &self,
        table: Table,
        columns: &str,
        query: &SearchQuery,
    ) -> Result<Vec<R>, StoreError>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        // Identifiers and the order fragments come from fixed enums; the
        // timestamp, offset and limit are bound.
        let sql = format!(
            "SELECT {columns} FROM {table} WHERE {col} {op} $1 ORDER BY {col} {dir} OFFSET $2 LIMIT $3;",
            table = table.name(),
            col = table.time_column(),
            op = query.order.comparison(),
            dir = query.order.direction(),
        );
        bounded(
            sqlx::query_as::<_, R>(&sql)
                .bind(query.time_start)
                .bind(query.offset())
                .bind(query.page_size)
                .fetch_all(&self.pool),
        )
        .await
    }

    /// On-disk size of every child partition, grouped by parent.
    ///
    /// Sizes are the relation's total footprint: heap, indices and TOAST.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::Timeout`] or [`StoreError::Database`].
    pub async fn table_usage(&self, schema: &SchemaManager) -> Result<TableUsage, StoreError> {
        let mut usage = TableUsage::new();
        for table in Table::ALL {
            let mut children = BTreeMap::new();
            for child in schema.list_children(table).await? {
                let bytes = self.relation_size(&child).await?;
                children.insert(child, bytes);
            }
            usage.insert(table.name().to_string(), children);
        }
        Ok(usage)
    }

    async fn relation_size(&self, relation: &str) -> Result<i64, StoreError> {
        bounded(
            sqlx::query_scalar::<_, i64>("SELECT pg_total_relation_size(($1::text)::regclass);")
                .bind(relation)
                .fetch_one(&self.pool),
        )
        .await
    }
}

async fn insert_row<F>(call: F, table: Table, time: DateTime<Utc>) -> Result<(), StoreError>
where
    F: Future<Output = Result<PgQueryResult, sqlx::Error>>,
{
    match bounded(call).await {
        Err(StoreError::Database(err)) if has_sqlstate(&err, CHECK_VIOLATION) => {
            Err(StoreError::NoPartition {
                table: table.name(),
                time,
            })
        }
        other => other.map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_row() -> RequestInfoRow {
        RequestInfoRow {
            time: Utc.with_ymd_and_hms(2023, 6, 1, 10, 20, 30).unwrap(),
            api_name: "GetObject".to_string(),
            bucket: "b".to_string(),
            object: "o".to_string(),
            time_to_response_ns: 1_500_000,
            remote_host: "10.0.0.1".to_string(),
            request_id: "R1".to_string(),
            user_agent: "ua".to_string(),
            response_status: "OK".to_string(),
            response_status_code: 200,
            request_content_length: None,
            response_content_length: None,
            access_key: None,
        }
    }

    #[test]
    fn test_request_info_row_omits_null_content_lengths() {
        let json = serde_json::to_value(sample_row()).unwrap();

        assert!(json.get("request_content_length").is_none());
        assert!(json.get("response_content_length").is_none());
        assert!(json["access_key"].is_null());
        assert_eq!(json["time_to_response_ns"], 1_500_000);
    }

    #[test]
    fn test_request_info_row_keeps_present_content_lengths() {
        let mut row = sample_row();
        row.request_content_length = Some(0);
        row.response_content_length = Some(42);

        let json = serde_json::to_value(row).unwrap();

        assert_eq!(json["request_content_length"], 0);
        assert_eq!(json["response_content_length"], 42);
    }

    #[test]
    fn test_raw_row_serialises_log_as_object() {
        let row = RawLogRow {
            event_time: Utc.with_ymd_and_hms(2023, 6, 1, 10, 20, 30).unwrap(),
            log: json!({"requestID": "R1", "api": {"name": "GetObject"}}),
        };

        let json = serde_json::to_value(row).unwrap();

        assert!(json["log"].is_object());
        assert_eq!(json["log"]["requestID"], "R1");
    }

    #[test]
    fn test_search_results_serialise_as_flat_array() {
        let results = SearchResults::ReqInfo(vec![sample_row()]);

        let json = serde_json::to_value(&results).unwrap();

        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(results.len(), 1);
        assert!(!results.is_empty());
    }
}
