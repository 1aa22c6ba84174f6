//! Error taxonomy for the storage layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use logsearch_core::error::ParseError;

/// SQLSTATE for "undefined table".
pub const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for "duplicate table"; also raised for a duplicate index name.
pub const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE for "duplicate column".
pub const DUPLICATE_COLUMN: &str = "42701";
/// SQLSTATE for "check violation"; raised when no partition covers a row.
pub const CHECK_VIOLATION: &str = "23514";

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The ingest body failed to decode.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A database call outlived its per-call deadline.
    #[error("database call exceeded its {0:?} deadline")]
    Timeout(Duration),

    /// The database rejected a call or the connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No child partition covers the row's timestamp. The partition
    /// creator has fallen behind; the row is lost unless the caller
    /// retries after the next creator tick.
    #[error("no partition of {table} covers {time}")]
    NoPartition {
        table: &'static str,
        time: DateTime<Utc>,
    },

    /// A migration statement failed with an error outside its absorb list.
    #[error("migration {name} failed")]
    Migration {
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Refused to drop a relation that is not a child of a known parent.
    #[error("refusing to drop unrecognised relation {0}")]
    NotAPartition(String),
}

/// True when `err` is a database error carrying the given SQLSTATE.
#[must_use]
pub fn has_sqlstate(err: &sqlx::Error, state: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == state)
}
