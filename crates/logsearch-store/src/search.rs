//! Search-query validation.
//!
//! Turns the raw `/api/query` parameters into a [`SearchQuery`] or a
//! caller-addressable validation error. The SQL itself is shaped in the
//! storage engine; only the timestamp, offset and limit are ever bound.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Page length when `pageSize` is absent.
pub const DEFAULT_PAGE_SIZE: i64 = 10;
/// Smallest accepted `pageSize`.
pub const MIN_PAGE_SIZE: i64 = 10;
/// Largest accepted `pageSize`; also bounds result-set memory.
pub const MAX_PAGE_SIZE: i64 = 10_000;

/// Which relation a search reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    /// Verbatim audit records from `audit_log_events`.
    Raw,
    /// Projected rows from `request_info`.
    ReqInfo,
}

/// Scan direction along the time column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeOrder {
    Asc,
    #[default]
    Desc,
}

impl TimeOrder {
    /// Comparison operator applied to the time column against `timeStart`.
    #[must_use]
    pub const fn comparison(self) -> &'static str {
        match self {
            Self::Asc => ">=",
            Self::Desc => "<=",
        }
    }

    /// `ORDER BY` direction keyword.
    #[must_use]
    pub const fn direction(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Raw query parameters, before validation.
///
/// The order flags are presence flags; their values are ignored.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub time_start: Option<String>,
    pub time_asc: bool,
    pub time_desc: bool,
    pub page_size: Option<String>,
    pub page_no: Option<String>,
}

/// A rejected search parameter. Maps to a 400 at the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SearchQueryError {
    #[error("q parameter is required")]
    MissingTarget,
    #[error("q must be `raw` or `reqinfo`")]
    UnknownTarget,
    #[error("timeStart must be RFC3339 or YYYY-MM-DD")]
    BadTimeStart,
    #[error("timeAsc and timeDesc cannot both be set")]
    ConflictingOrder,
    #[error("pageSize must be an integer between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}")]
    BadPageSize,
    #[error("pageNo must be a non-negative integer")]
    BadPageNo,
}

/// A validated, executable search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchQuery {
    pub target: SearchTarget,
    /// Upper bound of the scan when descending, lower bound when ascending.
    pub time_start: DateTime<Utc>,
    pub order: TimeOrder,
    pub page_size: i64,
    pub page_no: i64,
}

impl SearchQuery {
    /// Validates `params`, defaulting `timeStart` to `now`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SearchQueryError`] a parameter fails with.
    pub fn build(params: &SearchParams, now: DateTime<Utc>) -> Result<Self, SearchQueryError> {
        let target = match params.q.as_deref() {
            Some("raw") => SearchTarget::Raw,
            Some("reqinfo") => SearchTarget::ReqInfo,
            Some(_) => return Err(SearchQueryError::UnknownTarget),
            None => return Err(SearchQueryError::MissingTarget),
        };

        let order = match (params.time_asc, params.time_desc) {
            (true, true) => return Err(SearchQueryError::ConflictingOrder),
            (true, false) => TimeOrder::Asc,
            _ => TimeOrder::Desc,
        };

        let time_start = match params.time_start.as_deref() {
            Some(raw) => parse_time_start(raw).ok_or(SearchQueryError::BadTimeStart)?,
            None => now,
        };

        let page_size = match params.page_size.as_deref() {
            Some(raw) => {
                let size: i64 = raw.parse().map_err(|_| SearchQueryError::BadPageSize)?;
                if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) {
                    return Err(SearchQueryError::BadPageSize);
                }
                size
            }
            None => DEFAULT_PAGE_SIZE,
        };

        let page_no = match params.page_no.as_deref() {
            Some(raw) => {
                let page: i64 = raw.parse().map_err(|_| SearchQueryError::BadPageNo)?;
                if page < 0 {
                    return Err(SearchQueryError::BadPageNo);
                }
                page
            }
            None => 0,
        };

        Ok(Self {
            target,
            time_start,
            order,
            page_size,
            page_no,
        })
    }

    /// Row offset of the requested page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.page_no.saturating_mul(self.page_size)
    }
}

/// Accepts RFC3339 (with or without fractional seconds) or a bare
/// `YYYY-MM-DD`, which means midnight UTC of that day.
fn parse_time_start(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}
