//! Builders for audit-record JSON bodies.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

/// Builds audit-record documents shaped like the object-storage emitter's
/// output.
#[derive(Debug, Clone)]
pub struct AuditRecordBuilder {
    time: DateTime<Utc>,
    api_name: String,
    bucket: String,
    object: String,
    status: String,
    status_code: i64,
    time_to_response_ns: i64,
    remote_host: String,
    request_id: String,
    user_agent: String,
    request_headers: Vec<(String, String)>,
    response_headers: Vec<(String, String)>,
}

impl AuditRecordBuilder {
    /// Starts a builder for a record observed at `time`.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            api_name: "GetObject".to_string(),
            bucket: "test-bucket".to_string(),
            object: "test-object".to_string(),
            status: "OK".to_string(),
            status_code: 200,
            time_to_response_ns: 1_500_000,
            remote_host: "10.0.0.1".to_string(),
            request_id: "request-1".to_string(),
            user_agent: "test-agent".to_string(),
            request_headers: Vec::new(),
            response_headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn api_name(mut self, name: &str) -> Self {
        self.api_name = name.to_string();
        self
    }

    #[must_use]
    pub fn bucket(mut self, bucket: &str) -> Self {
        self.bucket = bucket.to_string();
        self
    }

    #[must_use]
    pub fn object(mut self, object: &str) -> Self {
        self.object = object.to_string();
        self
    }

    #[must_use]
    pub fn status(mut self, status: &str, code: i64) -> Self {
        self.status = status.to_string();
        self.status_code = code;
        self
    }

    #[must_use]
    pub fn time_to_response_ns(mut self, nanos: i64) -> Self {
        self.time_to_response_ns = nanos;
        self
    }

    #[must_use]
    pub fn request_id(mut self, id: &str) -> Self {
        self.request_id = id.to_string();
        self
    }

    #[must_use]
    pub fn request_header(mut self, name: &str, value: &str) -> Self {
        self.request_headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn response_header(mut self, name: &str, value: &str) -> Self {
        self.response_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Renders the record as a JSON document.
    #[must_use]
    pub fn build(&self) -> Value {
        let mut document = json!({
            "version": "1",
            "deploymentid": "test-deployment",
            "time": self.time.to_rfc3339_opts(SecondsFormat::Nanos, true),
            "api": {
                "name": self.api_name,
                "bucket": self.bucket,
                "object": self.object,
                "status": self.status,
                "statusCode": self.status_code,
                "timeToResponse": format!("{}ns", self.time_to_response_ns),
            },
            "remotehost": self.remote_host,
            "requestID": self.request_id,
            "userAgent": self.user_agent,
        });
        if !self.request_headers.is_empty() {
            document["requestHeader"] = header_map(&self.request_headers);
        }
        if !self.response_headers.is_empty() {
            document["responseHeader"] = header_map(&self.response_headers);
        }
        document
    }

    /// Renders the record as an ingest body.
    #[must_use]
    pub fn build_bytes(&self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}

fn header_map(headers: &[(String, String)]) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        map.insert(name.clone(), Value::String(value.clone()));
    }
    Value::Object(map)
}
