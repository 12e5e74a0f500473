//! Error taxonomy for the statistics engine.
//!
//! Only [`StatsError::ConstraintViolation`] is ever user-visible; the other
//! variants are operator or configuration problems. Stale ranking reads are
//! deliberately *not* an error anywhere in this crate: rankings are
//! eventually-consistent snapshots and staleness is expected.

use crate::media::MediaType;

/// Errors produced by aggregate maintenance, the ledger, and batch jobs.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// A delta would violate an aggregate invariant (a counter driven
    /// negative, rated exceeding total, status counts out of step with the
    /// entry total). The whole transaction is rejected; values are never
    /// clamped.
    #[error("constraint violation for user {user_id} {media_type}: {detail}")]
    ConstraintViolation {
        user_id: i64,
        media_type: MediaType,
        detail: String,
    },

    /// A delta targeted a (user, media type) that was never provisioned.
    /// Aggregate rows are created by explicit provisioning, not lazily.
    #[error("no aggregate row for user {user_id} {media_type}: provision it first")]
    MissingAggregate { user_id: i64, media_type: MediaType },

    /// An achievement references a metric recipe kind this engine does not
    /// know. Fails that single achievement's batch; the run continues.
    #[error("achievement '{code_name}' uses unknown metric kind '{kind}'")]
    RecipeNotFound { code_name: String, kind: String },

    /// An achievement or query names a dimension the media type does not
    /// have (e.g. `platform` for books).
    #[error("dimension '{dimension}' does not exist for media type {media_type}")]
    UnsupportedDimension {
        media_type: MediaType,
        dimension: String,
    },

    /// A ledger correction targeted an event id that does not exist.
    #[error("no activity event with id {0}")]
    EventNotFound(i64),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    /// A persisted value could not be decoded (corrupt status-count JSON,
    /// unknown stored media type or status string).
    #[error("corrupt stored value in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

impl StatsError {
    /// Construct a [`StatsError::ConstraintViolation`].
    #[must_use]
    pub fn constraint(user_id: i64, media_type: MediaType, detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            user_id,
            media_type,
            detail: detail.into(),
        }
    }

    /// Whether this error is user-visible (data-integrity rejection) as
    /// opposed to an operator/configuration problem.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = StatsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_message_names_the_row() {
        let err = StatsError::constraint(7, MediaType::Book, "total_entries would be -1");
        let msg = err.to_string();
        assert!(msg.contains("user 7"));
        assert!(msg.contains("book"));
        assert!(msg.contains("total_entries would be -1"));
        assert!(err.is_user_visible());
    }

    #[test]
    fn missing_aggregate_tells_caller_to_provision() {
        let err = StatsError::MissingAggregate {
            user_id: 3,
            media_type: MediaType::Game,
        };
        assert!(err.to_string().contains("provision"));
        assert!(!err.is_user_visible());
    }

    #[test]
    fn recipe_not_found_names_achievement_and_kind() {
        let err = StatsError::RecipeNotFound {
            code_name: "binge_master".into(),
            kind: "median_of_group".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("binge_master"));
        assert!(msg.contains("median_of_group"));
    }

    #[test]
    fn storage_errors_convert() {
        let inner = rusqlite::Error::QueryReturnedNoRows;
        let err: StatsError = inner.into();
        assert!(matches!(err, StatsError::Storage(_)));
    }
}
