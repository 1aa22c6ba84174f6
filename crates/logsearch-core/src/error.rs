//! Parse error type for the audit-record wire format.

use thiserror::Error;

/// Failure to decode an audit record body.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was not valid JSON, or a required field was missing or
    /// malformed (`time`, `api.timeToResponse`, duration suffixes).
    #[error("invalid audit record: {0}")]
    Decode(#[from] serde_json::Error),

    /// The body decoded to something other than a JSON object.
    #[error("audit record is not a JSON object")]
    NotAnObject,
}
