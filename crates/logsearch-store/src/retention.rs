//! Rolling partition creation and watermark-driven eviction.
//!
//! Two independent periodic tasks. The partition creator keeps a child
//! ready ahead of ingestion so inserts never land in a missing partition.
//! The eviction task measures disk usage and drops the oldest children
//! once usage crosses the high watermark, draining to the low watermark.
//! The gap between the two watermarks amortises measurement and DDL; the
//! sweep reclaims a meaningful fraction before disengaging instead of
//! thrashing at a single threshold.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logsearch_core::clock::Clock;

use crate::error::StoreError;
use crate::schema::{SchemaManager, Table};
use crate::store::{LogStore, TableUsage};

/// How often the creator checks that upcoming partitions exist.
pub const PARTITION_CREATE_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// How often the eviction task measures disk usage.
pub const VACUUM_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Retry delay after a failed sweep.
pub const VACUUM_RETRY_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Usage above this engages the eviction sweep (90% of capacity).
#[must_use]
pub const fn high_watermark(capacity_bytes: i64) -> i64 {
    capacity_bytes.saturating_mul(90) / 100
}

/// The sweep drains usage below this (70% of capacity).
#[must_use]
pub const fn low_watermark(capacity_bytes: i64) -> i64 {
    capacity_bytes.saturating_mul(70) / 100
}

/// One partition the sweep has decided to drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub child: String,
    pub bytes: i64,
}

fn total_usage(usage: &TableUsage) -> i64 {
    usage
        .values()
        .flat_map(|children| children.values())
        .sum()
}

/// Plans which children to drop to bring usage from above the high
/// watermark back under the low watermark.
///
/// Walks the parents round-robin, taking each parent's lexicographically
/// smallest remaining child (its oldest, by the date suffix) and
/// subtracting that child's measured size from the running total, until
/// projected usage falls under the low watermark or no children remain.
/// Returns an empty plan when usage is at or under the high watermark.
#[must_use]
pub fn plan_evictions(usage: &TableUsage, capacity_bytes: i64) -> Vec<Eviction> {
    let hi = high_watermark(capacity_bytes);
    let lo = low_watermark(capacity_bytes);
    let mut used = total_usage(usage);
    if used <= hi {
        return Vec::new();
    }

    // Queues iterate in parent-name order, one per parent, children
    // already name-sorted (oldest first).
    let queues: Vec<Vec<(&str, i64)>> = usage
        .values()
        .map(|children| {
            children
                .iter()
                .map(|(child, bytes)| (child.as_str(), *bytes))
                .collect()
        })
        .collect();
    let mut next = vec![0usize; queues.len()];
    let mut plan = Vec::new();

    loop {
        let mut progressed = false;
        for (slot, children) in queues.iter().enumerate() {
            if used < lo {
                return plan;
            }
            let Some(&(child, bytes)) = children.get(next[slot]) else {
                continue;
            };
            plan.push(Eviction {
                child: child.to_string(),
                bytes,
            });
            used -= bytes;
            next[slot] += 1;
            progressed = true;
        }
        if !progressed {
            return plan;
        }
    }
}

/// Supervises the two retention tasks.
pub struct RetentionController {
    schema: SchemaManager,
    store: LogStore,
    clock: Arc<dyn Clock>,
    capacity_bytes: i64,
}

impl RetentionController {
    /// Creates a controller over `capacity_bytes` of disk budget.
    ///
    /// A budget of zero or less disables eviction entirely.
    #[must_use]
    pub fn new(
        schema: SchemaManager,
        store: LogStore,
        clock: Arc<dyn Clock>,
        capacity_bytes: i64,
    ) -> Self {
        Self {
            schema,
            store,
            clock,
            capacity_bytes,
        }
    }

    /// Hourly loop keeping partitions created ahead of ingestion.
    ///
    /// Each tick ensures the partitions covering now and now+24h exist,
    /// re-establishing cover after a restart that skipped ticks. Errors
    /// are logged and retried next tick, never fatal. The first tick
    /// fires immediately.
    pub async fn run_partition_creator(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(PARTITION_CREATE_INTERVAL);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("partition creator stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.create_upcoming_partitions().await {
                warn!(error = %err, "partition creation failed; retrying next tick");
            }
        }
    }

    async fn create_upcoming_partitions(&self) -> Result<(), StoreError> {
        let now = self.clock.now();
        for t in [now, now + chrono::Duration::hours(24)] {
            for table in Table::ALL {
                self.schema.ensure_partition(table, t).await?;
            }
        }
        Ok(())
    }

    /// Eviction loop: sweep, then sleep.
    ///
    /// Sweeps hourly, or again after two minutes when a sweep fails. A
    /// non-positive capacity disables the loop. The first sweep runs
    /// immediately.
    pub async fn run_vacuum(&self, shutdown: CancellationToken) {
        if self.capacity_bytes <= 0 {
            info!("disk capacity not limited; eviction disabled");
            return;
        }
        loop {
            let delay = match self.sweep().await {
                Ok(()) => VACUUM_INTERVAL,
                Err(err) => {
                    warn!(error = %err, "eviction sweep failed; retrying shortly");
                    VACUUM_RETRY_INTERVAL
                }
            };
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("eviction task stopping");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn sweep(&self) -> Result<(), StoreError> {
        let usage = self.store.table_usage(&self.schema).await?;
        let plan = plan_evictions(&usage, self.capacity_bytes);
        if plan.is_empty() {
            debug!("disk usage under high watermark; nothing to evict");
            return Ok(());
        }
        let used = total_usage(&usage);
        let reason = format!(
            "disk usage {used} bytes exceeded high watermark {} bytes",
            high_watermark(self.capacity_bytes)
        );
        let mut reclaimed: i64 = 0;
        for eviction in &plan {
            self.schema.drop_child(&eviction.child, &reason).await?;
            reclaimed += eviction.bytes;
        }
        info!(used, reclaimed, dropped = plan.len(), "eviction sweep complete");
        Ok(())
    }
}
