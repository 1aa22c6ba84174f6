//! DDL authority for the audit-log schema.
//!
//! Every `CREATE`/`DROP`/`ALTER` the service issues goes through
//! [`SchemaManager`]. The storage engine and the retention controller never
//! run DDL themselves.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;

use logsearch_core::partition::PartitionInterval;

use crate::error::{DUPLICATE_TABLE, StoreError, UNDEFINED_TABLE, has_sqlstate};
use crate::migrations;
use crate::store::bounded;

/// SQL to create the raw-archive parent table.
const CREATE_AUDIT_LOG_EVENTS: &str = r"
CREATE TABLE audit_log_events (
    event_time TIMESTAMPTZ NOT NULL,
    log        JSONB NOT NULL
) PARTITION BY RANGE (event_time);
";

/// SQL to create the projected request-info parent table.
///
/// `access_key` is intentionally absent; the `add_access_key` migration
/// adds it.
const CREATE_REQUEST_INFO: &str = r"
CREATE TABLE request_info (
    time                    TIMESTAMPTZ NOT NULL,
    api_name                TEXT NOT NULL,
    bucket                  TEXT NOT NULL,
    object                  TEXT NOT NULL,
    time_to_response_ns     BIGINT NOT NULL,
    remote_host             TEXT NOT NULL,
    request_id              TEXT NOT NULL,
    user_agent              TEXT NOT NULL,
    response_status         TEXT NOT NULL,
    response_status_code    BIGINT NOT NULL,
    request_content_length  BIGINT,
    response_content_length BIGINT
) PARTITION BY RANGE (time);
";

const LIST_CHILDREN: &str = r"
SELECT child.relname
FROM pg_inherits
JOIN pg_class parent ON pg_inherits.inhparent = parent.oid
JOIN pg_class child ON pg_inherits.inhrelid = child.oid
WHERE parent.relname = $1
ORDER BY child.relname ASC;
";

/// The two range-partitioned parent tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    AuditLogEvents,
    RequestInfo,
}

impl Table {
    pub const ALL: [Self; 2] = [Self::AuditLogEvents, Self::RequestInfo];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AuditLogEvents => "audit_log_events",
            Self::RequestInfo => "request_info",
        }
    }

    /// Column the table is range-partitioned and searched by.
    #[must_use]
    pub const fn time_column(self) -> &'static str {
        match self {
            Self::AuditLogEvents => "event_time",
            Self::RequestInfo => "time",
        }
    }

    const fn create_sql(self) -> &'static str {
        match self {
            Self::AuditLogEvents => CREATE_AUDIT_LOG_EVENTS,
            Self::RequestInfo => CREATE_REQUEST_INFO,
        }
    }
}

/// PostgreSQL-backed schema manager.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    /// Creates a new `SchemaManager`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates any parent table that does not exist yet, along with the
    /// partition covering `now`.
    ///
    /// Existence is probed with a harmless read whose "undefined table"
    /// error code signals absence.
    ///
    /// # Errors
    ///
    /// Fails on any database error other than the absence probe's.
    pub async fn init_tables(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        for table in Table::ALL {
            if self.table_exists(table).await? {
                continue;
            }
            bounded(sqlx::query(table.create_sql()).execute(&self.pool)).await?;
            let partition = self.ensure_partition(table, now).await?;
            info!(table = table.name(), partition = %partition, "created parent table");
        }
        Ok(())
    }

    async fn table_exists(&self, table: Table) -> Result<bool, StoreError> {
        let probe = format!("SELECT 1 FROM {} WHERE false;", table.name());
        match bounded(sqlx::query(&probe).execute(&self.pool)).await {
            Ok(_) => Ok(true),
            Err(StoreError::Database(err)) if has_sqlstate(&err, UNDEFINED_TABLE) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Creates the child partition covering `t` if it does not exist, and
    /// returns its name.
    ///
    /// A concurrent creator winning the race surfaces as a duplicate-table
    /// error, which is absorbed.
    ///
    /// # Errors
    ///
    /// Fails on any other database error.
    pub async fn ensure_partition(
        &self,
        table: Table,
        t: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let interval = PartitionInterval::containing(t);
        let child = interval.child_name(table.name());
        // Identifiers cannot be bound as parameters; every name interpolated
        // here derives from the Table enum and the interval's date suffix.
        let ddl = format!(
            "CREATE TABLE {child} PARTITION OF {parent} FOR VALUES FROM ('{from}') TO ('{to}');",
            parent = table.name(),
            from = interval.start.to_rfc3339(),
            to = interval.end.to_rfc3339(),
        );
        match bounded(sqlx::query(&ddl).execute(&self.pool)).await {
            Ok(_) => {
                info!(table = table.name(), partition = %child, "created partition");
                Ok(child)
            }
            Err(StoreError::Database(err)) if has_sqlstate(&err, DUPLICATE_TABLE) => Ok(child),
            Err(err) => Err(err),
        }
    }

    /// Child partitions of `table`, ascending by name.
    ///
    /// The date suffix makes name order chronological; the eviction sweep
    /// relies on that to find the oldest child.
    ///
    /// # Errors
    ///
    /// Fails on any database error.
    pub async fn list_children(&self, table: Table) -> Result<Vec<String>, StoreError> {
        bounded(
            sqlx::query_scalar::<_, String>(LIST_CHILDREN)
                .bind(table.name())
                .fetch_all(&self.pool),
        )
        .await
    }

    /// Drops one child partition, logging `reason`.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::NotAPartition`] when `name` is not shaped
    /// like `<parent>_YYYY_MM_DD` for a known parent, or on any database
    /// error.
    pub async fn drop_child(&self, name: &str, reason: &str) -> Result<(), StoreError> {
        // The name is interpolated into DDL, so only the exact child shape
        // is accepted.
        if !is_child_name(name) {
            return Err(StoreError::NotAPartition(name.to_string()));
        }
        let ddl = format!("DROP TABLE IF EXISTS {name};");
        bounded(sqlx::query(&ddl).execute(&self.pool)).await?;
        info!(partition = %name, reason = %reason, "dropped partition");
        Ok(())
    }

    /// Applies the startup migrations in order, then spawns the access-key
    /// backfill on its own task.
    ///
    /// The backfill owns `shutdown` rather than any request-scoped context;
    /// it keeps running after startup returns and stops on service
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Fails when a migration statement errors with a SQLSTATE outside its
    /// absorb list. Re-runs over an already-migrated schema are absorbed.
    pub async fn run_migrations(&self, shutdown: &CancellationToken) -> Result<(), StoreError> {
        for migration in migrations::STARTUP_MIGRATIONS {
            migrations::apply(&self.pool, migration).await?;
        }
        tokio::spawn(migrations::backfill_access_keys(
            self.pool.clone(),
            shutdown.clone(),
        ));
        Ok(())
    }

    /// Applies the index migrations.
    ///
    /// Meant to run from a spawned task: index builds on populated tables
    /// can be slow, and a failure only costs query speed until the next
    /// boot retries.
    ///
    /// # Errors
    ///
    /// Fails when a statement errors with a SQLSTATE outside its absorb
    /// list.
    pub async fn create_indices(&self) -> Result<(), StoreError> {
        for migration in migrations::INDEX_MIGRATIONS {
            migrations::apply(&self.pool, migration).await?;
        }
        Ok(())
    }
}

/// True when `name` is `<parent>_YYYY_MM_DD` for a known parent.
fn is_child_name(name: &str) -> bool {
    Table::ALL.iter().any(|table| {
        name.strip_prefix(table.name())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(is_date_suffix)
    })
}

fn is_date_suffix(suffix: &str) -> bool {
    let mut parts = suffix.split('_');
    let shape = (parts.next(), parts.next(), parts.next(), parts.next());
    match shape {
        (Some(year), Some(month), Some(day), None) => [(year, 4), (month, 2), (day, 2)]
            .iter()
            .all(|(part, len)| {
                part.len() == *len && part.bytes().all(|b| b.is_ascii_digit())
            }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_and_time_columns() {
        assert_eq!(Table::AuditLogEvents.name(), "audit_log_events");
        assert_eq!(Table::AuditLogEvents.time_column(), "event_time");
        assert_eq!(Table::RequestInfo.name(), "request_info");
        assert_eq!(Table::RequestInfo.time_column(), "time");
    }

    #[test]
    fn test_child_name_shape() {
        assert!(is_child_name("audit_log_events_2024_02_09"));
        assert!(is_child_name("request_info_2022_01_25"));

        assert!(!is_child_name("pg_class"));
        assert!(!is_child_name("request_info"));
        assert!(!is_child_name("audit_log_eventsish_2024_01_01"));
        assert!(!is_child_name("request_info_2024_01_01; DROP TABLE x"));
        assert!(!is_child_name("request_info_2024_01"));
        assert!(!is_child_name("request_info_24_01_01"));
    }

    #[tokio::test]
    async fn test_drop_child_refuses_foreign_relations() {
        // connect_lazy never touches the database; the guard rejects the
        // name before any query is issued.
        let pool = PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let schema = SchemaManager::new(pool);

        let err = schema.drop_child("pg_class", "test").await.unwrap_err();

        assert!(matches!(err, StoreError::NotAPartition(_)));
    }
}
