//! The delta value object: a signed change set applied atomically to an
//! aggregate.
//!
//! Deltas form a commutative monoid under [`Delta::merge`]; applying two
//! deltas in sequence is equivalent to applying their merge once. The
//! list-management collaborator hands us one delta per mutation, derived
//! from the before/after entry states via [`Delta::between`].

use crate::media::Status;
use crate::model::entry::ListEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signed changes to every numeric aggregate field plus per-status counts.
///
/// All fields default to zero so sparse JSON documents parse cleanly:
/// `{"total_entries": 1, "status_counts": {"completed": 1}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Delta {
    pub time_spent_min: i64,
    pub total_entries: i64,
    pub total_redo: i64,
    pub entries_rated: i64,
    pub sum_entries_rated: f64,
    pub entries_commented: i64,
    pub entries_favorites: i64,
    /// Change to the media-type-specific unit (episodes, pages, ...).
    pub specific: i64,
    pub status_counts: BTreeMap<Status, i64>,
}

impl Delta {
    /// True when every field is zero and the status map carries no
    /// non-zero entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time_spent_min == 0
            && self.total_entries == 0
            && self.total_redo == 0
            && self.entries_rated == 0
            && self.sum_entries_rated == 0.0
            && self.entries_commented == 0
            && self.entries_favorites == 0
            && self.specific == 0
            && self.status_counts.values().all(|c| *c == 0)
    }

    /// Net change to one status bucket (0 when absent).
    #[must_use]
    pub fn status_change(&self, status: Status) -> i64 {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Fold `other` into `self` field-wise. Zeroed status entries are
    /// dropped so merged deltas compare equal regardless of merge order.
    pub fn merge(&mut self, other: &Self) {
        self.time_spent_min += other.time_spent_min;
        self.total_entries += other.total_entries;
        self.total_redo += other.total_redo;
        self.entries_rated += other.entries_rated;
        self.sum_entries_rated += other.sum_entries_rated;
        self.entries_commented += other.entries_commented;
        self.entries_favorites += other.entries_favorites;
        self.specific += other.specific;
        for (status, change) in &other.status_counts {
            *self.status_counts.entry(*status).or_insert(0) += change;
        }
        self.status_counts.retain(|_, c| *c != 0);
    }

    /// The merge of `self` and `other`, consuming neither.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Derive the delta for a list-entry transition.
    ///
    /// `None → Some` is a create, `Some → None` a delete, `Some → Some` an
    /// edit; `None → None` yields the empty delta. The result is exactly
    /// `contribution(after) − contribution(before)`, so replaying a
    /// sequence of transitions through an aggregate reproduces the totals
    /// a full rebuild would compute.
    #[must_use]
    pub fn between(before: Option<&ListEntry>, after: Option<&ListEntry>) -> Self {
        let mut delta = Self::default();
        if let Some(entry) = after {
            delta.merge(&Self::contribution(entry, 1));
        }
        if let Some(entry) = before {
            delta.merge(&Self::contribution(entry, -1));
        }
        delta
    }

    /// One entry's contribution to its aggregate, with `sign` +1 or −1.
    fn contribution(entry: &ListEntry, sign: i64) -> Self {
        let mut delta = Self {
            time_spent_min: entry.time_spent_min * sign,
            total_entries: sign,
            total_redo: entry.redo_count * sign,
            entries_commented: i64::from(entry.has_comment) * sign,
            entries_favorites: i64::from(entry.is_favorite) * sign,
            specific: entry.specific * sign,
            ..Self::default()
        };
        if let Some(rating) = entry.rating {
            delta.entries_rated = sign;
            delta.sum_entries_rated = if sign >= 0 { rating } else { -rating };
        }
        delta.status_counts.insert(entry.status, sign);
        delta
    }
}
