//! Shared test fixtures for the logsearch service.

mod clock;
mod records;

pub use clock::FixedClock;
pub use records::AuditRecordBuilder;
