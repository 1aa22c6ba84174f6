//! Logsearch store: PostgreSQL persistence for the audit-log service.
//!
//! Owns the range-partitioned schema, the idempotent forward migrations,
//! transactional ingest, time-ordered search, and the retention tasks that
//! create upcoming partitions and evict the oldest ones under disk pressure.

pub mod error;
pub mod migrations;
pub mod retention;
pub mod schema;
pub mod search;
pub mod store;
