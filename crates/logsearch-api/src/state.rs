//! Shared application state.

use std::sync::Arc;

use logsearch_core::clock::Clock;
use logsearch_store::store::LogStore;

/// State shared across all request handlers.
///
/// Cloning is cheap: the store wraps a pooled connection handle and the
/// clock is reference counted. Tokens are compared in constant time by
/// the auth middleware and must never be logged.
#[derive(Clone)]
pub struct AppState {
    pub store: LogStore,
    pub clock: Arc<dyn Clock>,
    pub audit_token: String,
    pub query_token: String,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: LogStore,
        clock: Arc<dyn Clock>,
        audit_token: String,
        query_token: String,
    ) -> Self {
        Self {
            store,
            clock,
            audit_token,
            query_token,
        }
    }
}
