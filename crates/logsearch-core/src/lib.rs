//! Logsearch core: audit-record wire model and partition arithmetic.
//!
//! This crate holds the pure pieces of the audit-log service: the wire-format
//! parser and the time-partition calculator. It contains no database or HTTP
//! code.

pub mod clock;
pub mod error;
pub mod partition;
pub mod record;
