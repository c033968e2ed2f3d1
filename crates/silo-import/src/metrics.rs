//! Metrics for the import state machine.
//!
//! Exposed through the `metrics` crate facade; the embedding host decides
//! the exporter. Recording is safe without an installed recorder.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: state transitions driven to completion.
    pub const TRANSITIONS_TOTAL: &str = "silo_import_transitions_total";
    /// Counter: events classified as not ours.
    pub const EVENTS_IGNORED_TOTAL: &str = "silo_import_events_ignored_total";
    /// Counter: compensation unwinds executed.
    pub const ROLLBACKS_TOTAL: &str = "silo_import_rollbacks_total";
    /// Counter: manifests built and published.
    pub const MANIFESTS_TOTAL: &str = "silo_import_manifests_total";
    /// Counter: table creation retries.
    pub const CREATE_TABLE_RETRIES_TOTAL: &str = "silo_import_create_table_retries_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Transition name (init_to_launched, launched_to_completed).
    pub const TRANSITION: &str = "transition";
    /// Outcome status (launched, scaled_down, skipped).
    pub const STATUS: &str = "status";
}

/// High-level interface for recording import metrics. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ImportMetrics;

impl ImportMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records one completed transition.
    pub fn record_transition(&self, transition: &str, status: &str) {
        counter!(
            names::TRANSITIONS_TOTAL,
            labels::TRANSITION => transition.to_string(),
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }

    /// Records one ignored event.
    pub fn record_ignored(&self) {
        counter!(names::EVENTS_IGNORED_TOTAL).increment(1);
    }

    /// Records one compensation unwind.
    pub fn record_rollback(&self) {
        counter!(names::ROLLBACKS_TOTAL).increment(1);
    }

    /// Records one built manifest.
    pub fn record_manifest_built(&self) {
        counter!(names::MANIFESTS_TOTAL).increment(1);
    }

    /// Records one table creation retry.
    pub fn record_create_table_retry(&self, attempt: u32) {
        counter!(
            names::CREATE_TABLE_RETRIES_TOTAL,
            "attempt" => attempt.to_string(),
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_does_not_panic() {
        let metrics = ImportMetrics::new();
        metrics.record_transition("init_to_launched", "launched");
        metrics.record_ignored();
        metrics.record_rollback();
        metrics.record_manifest_built();
        metrics.record_create_table_retry(2);
    }
}
