//! History snapshots: point-in-time copies of an aggregate's totals.
//!
//! One snapshot is written after every successful delta application, in
//! the same transaction. Trend reconstruction diffs consecutive snapshots
//! instead of replaying the ledger; the ledger is for per-event detail.

use crate::media::{MediaType, Status};
use crate::model::delta::Delta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full copy of an aggregate's non-key fields at `recorded_at_us`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub user_id: i64,
    pub media_type: MediaType,
    pub recorded_at_us: i64,
    pub time_spent_min: i64,
    pub total_entries: i64,
    pub total_redo: i64,
    pub entries_rated: i64,
    pub sum_entries_rated: f64,
    pub entries_commented: i64,
    pub entries_favorites: i64,
    pub total_specific: i64,
    pub status_counts: BTreeMap<Status, i64>,
}

impl StatsSnapshot {
    /// The change from `prev` to `self`, per numeric field and per status.
    ///
    /// A status present on one side and absent on the other counts as zero
    /// on the missing side. Statuses whose counts did not change are
    /// dropped from the result.
    #[must_use]
    pub fn delta_since(&self, prev: &Self) -> Delta {
        let mut status_counts = BTreeMap::new();
        for status in self.status_counts.keys().chain(prev.status_counts.keys()) {
            let before = prev.status_counts.get(status).copied().unwrap_or(0);
            let after = self.status_counts.get(status).copied().unwrap_or(0);
            if after != before {
                status_counts.insert(*status, after - before);
            }
        }
        Delta {
            time_spent_min: self.time_spent_min - prev.time_spent_min,
            total_entries: self.total_entries - prev.total_entries,
            total_redo: self.total_redo - prev.total_redo,
            entries_rated: self.entries_rated - prev.entries_rated,
            sum_entries_rated: self.sum_entries_rated - prev.sum_entries_rated,
            entries_commented: self.entries_commented - prev.entries_commented,
            entries_favorites: self.entries_favorites - prev.entries_favorites,
            specific: self.total_specific - prev.total_specific,
            status_counts,
        }
    }
}
