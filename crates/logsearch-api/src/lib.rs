//! HTTP surface of the logsearch service.
//!
//! Exposes three endpoints: an unauthenticated liveness probe at
//! `/status`, token-gated audit-record ingestion at `/api/ingest`, and
//! token-gated search at `/api/query`. Router assembly lives in
//! [`routes`] so integration tests can drive the exact production
//! service without binding a socket.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
