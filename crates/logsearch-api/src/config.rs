//! Environment-driven server configuration.
//!
//! Every setting is read once at startup. A missing or empty variable
//! aborts the process with an error naming the variable, so a
//! misconfigured deployment fails loudly instead of serving with a
//! blank auth token.

use crate::error::AppError;

/// Connection string for the backing PostgreSQL database.
pub const ENV_PG_CONN_STR: &str = "LOGSEARCH_PG_CONN_STR";
/// Token required by the ingest endpoint.
pub const ENV_AUDIT_AUTH_TOKEN: &str = "LOGSEARCH_AUDIT_AUTH_TOKEN";
/// Token required by the query endpoint.
pub const ENV_QUERY_AUTH_TOKEN: &str = "LOGSEARCH_QUERY_AUTH_TOKEN";
/// Disk capacity for the vacuum watermarks, in gigabytes.
pub const ENV_DISK_CAPACITY_GB: &str = "LOGSEARCH_DISK_CAPACITY_GB";

/// TCP port the server listens on.
pub const LISTEN_PORT: u16 = 8080;

/// Runtime configuration assembled from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub pg_conn_str: String,
    pub audit_auth_token: String,
    pub query_auth_token: String,
    /// Disk capacity in bytes. Zero or negative disables the vacuum.
    pub disk_capacity_bytes: i64,
}

impl Config {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] naming the offending variable when
    /// one is missing, empty, or (for the capacity) not an integer.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |name: &'static str| -> Result<String, AppError> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(AppError::Config(format!("{name} must be set and non-empty"))),
            }
        };

        let pg_conn_str = required(ENV_PG_CONN_STR)?;
        let audit_auth_token = required(ENV_AUDIT_AUTH_TOKEN)?;
        let query_auth_token = required(ENV_QUERY_AUTH_TOKEN)?;
        let capacity_gb: i64 = required(ENV_DISK_CAPACITY_GB)?.trim().parse().map_err(|_| {
            AppError::Config(format!(
                "{ENV_DISK_CAPACITY_GB} must be an integer gigabyte count"
            ))
        })?;

        Ok(Self {
            pg_conn_str,
            audit_auth_token,
            query_auth_token,
            disk_capacity_bytes: capacity_gb.saturating_mul(1 << 30),
        })
    }
}

// --- tests ---
