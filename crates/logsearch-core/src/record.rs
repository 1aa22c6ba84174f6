//! Audit-record wire format.
//!
//! Object-storage nodes emit one JSON document per request. The ingest path
//! keeps the document verbatim for the raw archive and projects a typed view
//! out of it for the queryable `request_info` row. Unknown emitter fields
//! survive in the verbatim document; the typed view ignores them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ParseError;

/// Nanosecond count decoded from the emitter's `"<digits>ns"` duration
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsDuration(pub i64);

impl<'de> Deserialize<'de> for NsDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let text = String::deserialize(deserializer)?;
        let digits = text
            .strip_suffix("ns")
            .ok_or_else(|| D::Error::custom(format!("duration {text:?} lacks an ns suffix")))?;
        let nanos: i64 = digits.parse().map_err(|_| {
            D::Error::custom(format!("duration {text:?} is not an integer nanosecond count"))
        })?;
        Ok(Self(nanos))
    }
}

/// The `api` sub-object of an audit record.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "statusCode", default)]
    pub status_code: i64,
    /// Optional; a present but malformed value still fails the whole record.
    #[serde(rename = "timeToFirstByte", default)]
    pub time_to_first_byte: Option<NsDuration>,
    #[serde(rename = "timeToResponse")]
    pub time_to_response: NsDuration,
}

/// Typed view of an audit record.
///
/// Only `time` and `api.timeToResponse` are hard requirements; every other
/// field falls back to its empty value so that sparse emitter records still
/// produce a `request_info` row.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditRecord {
    #[serde(default)]
    pub version: String,
    /// Event time, RFC3339 with optional fractional seconds.
    pub time: DateTime<Utc>,
    pub api: ApiDetails,
    #[serde(rename = "remotehost", default)]
    pub remote_host: String,
    #[serde(rename = "requestID", default)]
    pub request_id: String,
    #[serde(rename = "userAgent", default)]
    pub user_agent: String,
    #[serde(rename = "requestClaims", default)]
    pub request_claims: HashMap<String, Value>,
    #[serde(rename = "requestQuery", default)]
    pub request_query: HashMap<String, String>,
    #[serde(rename = "requestHeader", default)]
    pub request_header: HashMap<String, String>,
    #[serde(rename = "responseHeader", default)]
    pub response_header: HashMap<String, String>,
}

impl AuditRecord {
    /// Request body size taken from the `Content-Length` request header.
    ///
    /// `None` when the header is absent or not an unsigned integer.
    #[must_use]
    pub fn request_content_length(&self) -> Option<i64> {
        content_length(&self.request_header)
    }

    /// Response body size taken from the `Content-Length` response header.
    ///
    /// `None` when the header is absent or not an unsigned integer.
    #[must_use]
    pub fn response_content_length(&self) -> Option<i64> {
        content_length(&self.response_header)
    }
}

fn content_length(headers: &HashMap<String, String>) -> Option<i64> {
    let raw = headers.get("Content-Length")?;
    let parsed: u64 = raw.parse().ok()?;
    i64::try_from(parsed).ok()
}

/// One decoded audit record: the verbatim document destined for the raw
/// archive plus the typed view the `request_info` row is projected from.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub document: Value,
    pub record: AuditRecord,
}

/// Decodes one audit record body.
///
/// Returns `Ok(None)` for a body that decodes to an empty JSON object.
/// Emitter heartbeats produce those; ingestion treats them as a successful
/// no-op.
///
/// # Errors
///
/// Returns [`ParseError`] when the body is not valid JSON, decodes to a
/// non-object, is missing `time` or `api.timeToResponse`, carries a `time`
/// that is not RFC3339, or carries a duration without the `ns` suffix.
pub fn parse(body: &[u8]) -> Result<Option<ParsedEvent>, ParseError> {
    let document: Value = serde_json::from_slice(body)?;
    let Some(object) = document.as_object() else {
        return Err(ParseError::NotAnObject);
    };
    if object.is_empty() {
        return Ok(None);
    }
    let record: AuditRecord = serde_json::from_value(document.clone())?;
    Ok(Some(ParsedEvent { document, record }))
}
