//! Ledger events: one immutable row per meaningful user action.

use crate::media::MediaType;
use serde::{Deserialize, Serialize};

/// One append-only activity ledger row.
///
/// Events are written inside the same transaction as the aggregate update
/// they describe and are never modified afterwards, except through the
/// explicit correction path (amend/forget of a single event by id), which
/// deliberately does *not* re-derive aggregates — see the ledger module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Ledger row id, assigned by storage on append.
    pub id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub media_type: MediaType,
    /// Media-type-specific units gained by this action (may be negative
    /// for corrections flowing through the normal delta path).
    pub specific_gained: i64,
    /// The action moved an entry into the completed status.
    pub is_completed: bool,
    /// The action recorded a re-consumption.
    pub is_redo: bool,
    pub created_at_us: i64,
}
