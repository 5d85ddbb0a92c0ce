//! Item metrics.
//!
//! Counters are recorded through the `metrics` facade; they are no-ops
//! until the embedding application installs a recorder.

use metrics::counter;

use crate::cancel::PoolKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const ITEMS_COMPLETED_TOTAL: &str = "vgen_items_completed_total";
    pub const ITEMS_FAILED_TOTAL: &str = "vgen_items_failed_total";
    pub const ITEMS_REQUEUED_TOTAL: &str = "vgen_items_requeued_total";
    pub const POOL_RUNS_TOTAL: &str = "vgen_pool_runs_total";
    pub const CREDENTIAL_ERRORS_TOTAL: &str = "vgen_credential_errors_total";
}

/// Record an item finished by a pool.
pub fn record_item_completed(pool: PoolKind) {
    let labels = [("pool", pool.as_str().to_string())];
    counter!(names::ITEMS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record an item that failed in a pool.
pub fn record_item_failed(pool: PoolKind, credential_error: bool) {
    let labels = [("pool", pool.as_str().to_string())];
    counter!(names::ITEMS_FAILED_TOTAL, &labels).increment(1);
    if credential_error {
        counter!(names::CREDENTIAL_ERRORS_TOTAL, &labels).increment(1);
    }
}

/// Record items put back to `queued` after a cancelled run.
pub fn record_items_requeued(count: usize) {
    counter!(names::ITEMS_REQUEUED_TOTAL).increment(count as u64);
}

/// Record the end of a pool run.
pub fn record_pool_run(pool: PoolKind, outcome: &str) {
    let labels = [
        ("pool", pool.as_str().to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::POOL_RUNS_TOTAL, &labels).increment(1);
}
