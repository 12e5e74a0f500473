//! The aggregate row: current per-(user, media type) totals.
//!
//! Aggregates are mutated only by delta application and the full-rebuild
//! job. `average_rating` is always derived from the stored sums, never
//! stored, so it cannot drift under repeated deltas.

use crate::media::{MediaType, Status};
use crate::model::delta::Delta;
use crate::model::snapshot::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current totals for one (user, media type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAggregate {
    pub user_id: i64,
    pub media_type: MediaType,
    /// Total consumption time in minutes.
    pub time_spent_min: i64,
    /// Number of list entries across all statuses.
    pub total_entries: i64,
    /// Total re-consumption count (rewatches, rereads, replays).
    pub total_redo: i64,
    /// Number of entries carrying a rating.
    pub entries_rated: i64,
    /// Sum of all ratings; divide by `entries_rated` for the average.
    pub sum_entries_rated: f64,
    pub entries_commented: i64,
    pub entries_favorites: i64,
    /// Media-type-specific unit total (see [`MediaType::specific_unit`]).
    pub total_specific: i64,
    /// Count per status; every status in the type's vocabulary is present.
    pub status_counts: BTreeMap<Status, i64>,
    /// Inactive aggregates are excluded from rankings and rarity.
    pub active: bool,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl MediaAggregate {
    /// A zeroed aggregate for a freshly provisioned (user, media type),
    /// with the full status vocabulary present at 0.
    #[must_use]
    pub fn fresh(user_id: i64, media_type: MediaType, now_us: i64) -> Self {
        let status_counts = media_type.statuses().iter().map(|s| (*s, 0)).collect();
        Self {
            user_id,
            media_type,
            time_spent_min: 0,
            total_entries: 0,
            total_redo: 0,
            entries_rated: 0,
            sum_entries_rated: 0.0,
            entries_commented: 0,
            entries_favorites: 0,
            total_specific: 0,
            status_counts,
            active: true,
            created_at_us: now_us,
            updated_at_us: now_us,
        }
    }

    /// Derived mean rating, or `None` when nothing is rated.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_rating(&self) -> Option<f64> {
        if self.entries_rated > 0 {
            Some(self.sum_entries_rated / self.entries_rated as f64)
        } else {
            None
        }
    }

    /// Count for one status (0 when absent from the map).
    #[must_use]
    pub fn status_count(&self, status: Status) -> i64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Check every aggregate invariant, returning the first violation as a
    /// human-readable detail string.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated invariant: a negative counter,
    /// `entries_rated` exceeding `total_entries`, status counts out of step
    /// with `total_entries`, or a status outside the type's vocabulary.
    pub fn validate(&self) -> Result<(), String> {
        let counters = [
            ("time_spent_min", self.time_spent_min),
            ("total_entries", self.total_entries),
            ("total_redo", self.total_redo),
            ("entries_rated", self.entries_rated),
            ("entries_commented", self.entries_commented),
            ("entries_favorites", self.entries_favorites),
            ("total_specific", self.total_specific),
        ];
        for (name, value) in counters {
            if value < 0 {
                return Err(format!("{name} would be {value}"));
            }
        }
        if self.sum_entries_rated < -1e-9 {
            return Err(format!(
                "sum_entries_rated would be {}",
                self.sum_entries_rated
            ));
        }
        if self.entries_rated > self.total_entries {
            return Err(format!(
                "entries_rated {} would exceed total_entries {}",
                self.entries_rated, self.total_entries
            ));
        }
        let mut sum = 0;
        for (status, count) in &self.status_counts {
            if !self.media_type.supports_status(*status) {
                return Err(format!(
                    "status '{status}' not in {} vocabulary",
                    self.media_type
                ));
            }
            if *count < 0 {
                return Err(format!("status '{status}' count would be {count}"));
            }
            sum += count;
        }
        if sum != self.total_entries {
            return Err(format!(
                "status counts sum to {sum} but total_entries is {}",
                self.total_entries
            ));
        }
        Ok(())
    }

    /// Fold a delta into a copy of this aggregate and re-validate.
    ///
    /// Pure: `self` is untouched. The caller decides what the resulting
    /// `updated_at_us` should be.
    ///
    /// # Errors
    ///
    /// Returns the invariant-violation detail if the folded state is
    /// invalid; the aggregate must then be left unmodified by the caller.
    pub fn folded(&self, delta: &Delta, now_us: i64) -> Result<Self, String> {
        let mut next = self.clone();
        next.time_spent_min += delta.time_spent_min;
        next.total_entries += delta.total_entries;
        next.total_redo += delta.total_redo;
        next.entries_rated += delta.entries_rated;
        next.sum_entries_rated += delta.sum_entries_rated;
        next.entries_commented += delta.entries_commented;
        next.entries_favorites += delta.entries_favorites;
        next.total_specific += delta.specific;
        for (status, change) in &delta.status_counts {
            *next.status_counts.entry(*status).or_insert(0) += change;
        }
        next.updated_at_us = now_us;
        next.validate()?;
        Ok(next)
    }

    /// Snapshot of the current state, stamped `recorded_at_us`.
    #[must_use]
    pub fn snapshot(&self, recorded_at_us: i64) -> StatsSnapshot {
        StatsSnapshot {
            user_id: self.user_id,
            media_type: self.media_type,
            recorded_at_us,
            time_spent_min: self.time_spent_min,
            total_entries: self.total_entries,
            total_redo: self.total_redo,
            entries_rated: self.entries_rated,
            sum_entries_rated: self.sum_entries_rated,
            entries_commented: self.entries_commented,
            entries_favorites: self.entries_favorites,
            total_specific: self.total_specific,
            status_counts: self.status_counts.clone(),
        }
    }
}
