//! A user's list entry for one media item.
//!
//! Entries are owned by the list-management collaborator; this engine
//! reads them for metric recipes, affinity grouping, and full rebuilds,
//! and carries a minimal writable copy so the pipeline is exercisable
//! end to end.

use crate::media::{MediaType, Status};
use serde::{Deserialize, Serialize};

/// One (user, media item) list row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub user_id: i64,
    pub media_type: MediaType,
    pub media_id: i64,
    pub status: Status,
    /// Rating on the 0–10 scale, unset when the user has not rated.
    pub rating: Option<f64>,
    pub is_favorite: bool,
    pub has_comment: bool,
    /// Re-consumption count (rewatches, rereads, replays).
    pub redo_count: i64,
    /// Media-type-specific units consumed (episodes, pages, ...).
    pub specific: i64,
    /// Consumption time in minutes.
    pub time_spent_min: i64,
    pub updated_at_us: i64,
}

impl ListEntry {
    /// An unrated, unconsumed planned entry.
    #[must_use]
    pub const fn planned(user_id: i64, media_type: MediaType, media_id: i64) -> Self {
        Self {
            user_id,
            media_type,
            media_id,
            status: Status::Planned,
            rating: None,
            is_favorite: false,
            has_comment: false,
            redo_count: 0,
            specific: 0,
            time_spent_min: 0,
            updated_at_us: 0,
        }
    }
}
