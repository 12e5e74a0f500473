//! The delta applicator: atomic read-modify-write of one aggregate row.
//!
//! One call applies one mutation from the list-management collaborator:
//! fold the delta into the targeted aggregate, append the matching ledger
//! event, and record a history snapshot of the post-update state — all
//! inside a single `BEGIN IMMEDIATE` transaction. Holding the write lock
//! from the first read serializes concurrent deltas to the *same* row; a
//! failure anywhere (missing row, invariant violation, storage error)
//! rolls the whole thing back, so no event or snapshot is ever written
//! for a rejected delta.

use crate::db::query;
use crate::error::{Result, StatsError};
use crate::media::{MediaType, Status};
use crate::model::{Delta, MediaAggregate};
use rusqlite::{Connection, TransactionBehavior, params};

/// Everything written by one successful delta application.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// The aggregate state after the delta.
    pub aggregate: MediaAggregate,
    /// Ledger row appended for this action.
    pub event_id: i64,
    /// History snapshot row recording the post-update state.
    pub snapshot_id: i64,
}

/// Apply one delta to the (user, media type) aggregate.
///
/// `media_id` identifies the list entry that caused the mutation and is
/// recorded on the ledger event. The event's `specific_gained` is the
/// delta's specific contribution; `is_completed` is set when the delta
/// moves an entry into the completed status, `is_redo` when it records a
/// re-consumption.
///
/// # Errors
///
/// - [`StatsError::MissingAggregate`] when the row was never provisioned
///   (rows are created by explicit provisioning, not lazily).
/// - [`StatsError::ConstraintViolation`] when the folded state would break
///   an invariant; nothing is written.
/// - [`StatsError::Storage`] on database failure.
pub fn apply_delta(
    conn: &mut Connection,
    user_id: i64,
    media_type: MediaType,
    media_id: i64,
    delta: &Delta,
    now_us: i64,
) -> Result<ApplyOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = query::require_aggregate(&tx, user_id, media_type)?;
    let next = current
        .folded(delta, now_us)
        .map_err(|detail| StatsError::constraint(user_id, media_type, detail))?;
    query::store_totals(&tx, &next)?;

    let is_completed = delta.status_change(Status::Completed) > 0;
    let is_redo = delta.total_redo > 0;
    tx.execute(
        "INSERT INTO activity_log (
            user_id, media_id, media_type, specific_gained,
            is_completed, is_redo, created_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            media_id,
            media_type.as_str(),
            delta.specific,
            is_completed,
            is_redo,
            now_us
        ],
    )?;
    let event_id = tx.last_insert_rowid();

    let snapshot_id = query::insert_snapshot(&tx, &next.snapshot(now_us))?;

    tx.commit()?;

    tracing::debug!(
        user_id,
        media_type = %media_type,
        media_id,
        event_id,
        "applied delta"
    );

    Ok(ApplyOutcome {
        aggregate: next,
        event_id,
        snapshot_id,
    })
}
