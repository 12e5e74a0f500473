//! Full recomputation of aggregates from the entry lists.
//!
//! Rebuild is the recovery path after a correction or suspected drift: it
//! re-derives every counter from `list_entries` and overwrites the stored
//! totals. It is not activity — no ledger event and no history snapshot is
//! written — and it preserves the `active` flag and the provisioning
//! timestamp. Each (user, media type) pair is rebuilt in its own write
//! transaction so a store-wide pass never holds one long lock.

use crate::error::{Result, StatsError};
use crate::media::MediaType;
use crate::model::{Delta, MediaAggregate};
use rusqlite::{Connection, TransactionBehavior};

/// Outcome of a rebuild pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// (user, media type) pairs recomputed.
    pub pairs: usize,
    /// List entries folded across all pairs.
    pub entries: usize,
    /// Pairs whose stored totals disagreed with the recomputation.
    pub drifted: usize,
}

impl RebuildReport {
    fn absorb(&mut self, entries: usize, drifted: bool) {
        self.pairs += 1;
        self.entries += entries;
        self.drifted += usize::from(drifted);
    }
}

fn totals_match(a: &MediaAggregate, b: &MediaAggregate) -> bool {
    a.time_spent_min == b.time_spent_min
        && a.total_entries == b.total_entries
        && a.total_redo == b.total_redo
        && a.entries_rated == b.entries_rated
        && (a.sum_entries_rated - b.sum_entries_rated).abs() < 1e-9
        && a.entries_commented == b.entries_commented
        && a.entries_favorites == b.entries_favorites
        && a.total_specific == b.total_specific
        && a.status_counts == b.status_counts
}

fn rebuild_in_tx(
    conn: &mut Connection,
    user_id: i64,
    media_type: MediaType,
    now_us: i64,
) -> Result<(usize, bool)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let stored = super::query::require_aggregate(&tx, user_id, media_type)?;
    let entries = super::query::list_entries(&tx, user_id, media_type)?;

    let mut total = Delta::default();
    for entry in &entries {
        total.merge(&Delta::between(None, Some(entry)));
    }
    let base = MediaAggregate::fresh(user_id, media_type, stored.created_at_us);
    let mut next = base
        .folded(&total, now_us)
        .map_err(|detail| StatsError::Corrupt {
            table: "list_entries",
            detail,
        })?;
    next.active = stored.active;

    let drifted = !totals_match(&stored, &next);
    super::query::store_totals(&tx, &next)?;
    tx.commit()?;

    if drifted {
        tracing::warn!(
            user_id,
            media_type = %media_type,
            entries = entries.len(),
            "stored totals drifted from entry lists; overwritten"
        );
    } else {
        tracing::debug!(user_id, media_type = %media_type, "aggregate already consistent");
    }
    Ok((entries.len(), drifted))
}

/// Recompute one (user, media type) aggregate from its entry list.
///
/// # Errors
///
/// Returns [`StatsError::MissingAggregate`] when the pair was never
/// provisioned, and [`StatsError::Corrupt`] when the stored entries cannot
/// produce a valid aggregate.
pub fn rebuild_pair(
    conn: &mut Connection,
    user_id: i64,
    media_type: MediaType,
    now_us: i64,
) -> Result<RebuildReport> {
    let mut report = RebuildReport::default();
    let (entries, drifted) = rebuild_in_tx(conn, user_id, media_type, now_us)?;
    report.absorb(entries, drifted);
    Ok(report)
}

/// Recompute every provisioned aggregate of one user.
///
/// # Errors
///
/// Fails on the first pair that cannot be rebuilt.
pub fn rebuild_user(conn: &mut Connection, user_id: i64, now_us: i64) -> Result<RebuildReport> {
    let pairs: Vec<MediaType> = super::query::list_user_aggregates(conn, user_id)?
        .into_iter()
        .map(|agg| agg.media_type)
        .collect();
    let mut report = RebuildReport::default();
    for media_type in pairs {
        let (entries, drifted) = rebuild_in_tx(conn, user_id, media_type, now_us)?;
        report.absorb(entries, drifted);
    }
    Ok(report)
}

/// Recompute every provisioned aggregate in the store.
///
/// # Errors
///
/// Fails on the first pair that cannot be rebuilt.
pub fn rebuild_all(conn: &mut Connection, now_us: i64) -> Result<RebuildReport> {
    let pairs = super::query::list_provisioned(conn)?;
    let mut report = RebuildReport::default();
    for (user_id, media_type) in pairs {
        let (entries, drifted) = rebuild_in_tx(conn, user_id, media_type, now_us)?;
        report.absorb(entries, drifted);
    }
    tracing::info!(
        pairs = report.pairs,
        entries = report.entries,
        drifted = report.drifted,
        "store rebuild finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrations, query};
    use crate::media::Status;
    use crate::model::ListEntry;

    fn store_with_entries() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        let user = query::create_user(&conn, "nora", 0).expect("create user");
        query::provision(&conn, user, MediaType::Book, 0).expect("provision");

        for (media_id, status, rating, pages) in [
            (1_i64, Status::Completed, Some(8.0), 320_i64),
            (2, Status::InProgress, None, 120),
            (3, Status::Completed, Some(6.5), 410),
        ] {
            query::upsert_entry(
                &conn,
                &ListEntry {
                    user_id: user,
                    media_type: MediaType::Book,
                    media_id,
                    status,
                    rating,
                    is_favorite: media_id == 1,
                    has_comment: false,
                    redo_count: 0,
                    specific: pages,
                    time_spent_min: pages,
                    updated_at_us: 0,
                },
            )
            .expect("upsert entry");
        }
        (conn, user)
    }

    #[test]
    fn rebuild_rederives_totals_from_entries() {
        let (mut conn, user) = store_with_entries();

        // aggregates were provisioned empty, so the first rebuild drifts
        let report = rebuild_pair(&mut conn, user, MediaType::Book, 5_000).expect("rebuild");
        assert_eq!(report.pairs, 1);
        assert_eq!(report.entries, 3);
        assert_eq!(report.drifted, 1);

        let agg = query::require_aggregate(&conn, user, MediaType::Book).expect("read");
        assert_eq!(agg.total_entries, 3);
        assert_eq!(agg.total_specific, 850);
        assert_eq!(agg.time_spent_min, 850);
        assert_eq!(agg.entries_rated, 2);
        assert!((agg.sum_entries_rated - 14.5).abs() < 1e-9);
        assert_eq!(agg.entries_favorites, 1);
        assert_eq!(agg.status_count(Status::Completed), 2);
        assert_eq!(agg.status_count(Status::InProgress), 1);
        assert_eq!(agg.updated_at_us, 5_000);

        // a second pass finds nothing to fix
        let again = rebuild_pair(&mut conn, user, MediaType::Book, 6_000).expect("rebuild");
        assert_eq!(again.drifted, 0);
    }

    #[test]
    fn rebuild_preserves_opt_out_and_provisioning_time() {
        let (mut conn, user) = store_with_entries();
        query::set_active(&conn, user, MediaType::Book, false, 100).expect("deactivate");

        rebuild_pair(&mut conn, user, MediaType::Book, 5_000).expect("rebuild");

        let agg = query::require_aggregate(&conn, user, MediaType::Book).expect("read");
        assert!(!agg.active);
        assert_eq!(agg.created_at_us, 0);
    }

    #[test]
    fn rebuild_writes_no_ledger_event_and_no_snapshot() {
        fn count(conn: &Connection, table: &str) -> i64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
                .expect("count")
        }
        let (mut conn, user) = store_with_entries();
        let (events, snaps) = (count(&conn, "activity_log"), count(&conn, "stats_history"));

        rebuild_pair(&mut conn, user, MediaType::Book, 5_000).expect("rebuild");

        assert_eq!(count(&conn, "activity_log"), events);
        assert_eq!(count(&conn, "stats_history"), snaps);
    }

    #[test]
    fn rebuild_all_visits_every_provisioned_pair() {
        let (mut conn, user) = store_with_entries();
        let other = query::create_user(&conn, "pat", 0).expect("create user");
        query::provision(&conn, other, MediaType::Game, 0).expect("provision");
        query::provision(&conn, user, MediaType::Movie, 0).expect("provision");

        let report = rebuild_all(&mut conn, 5_000).expect("rebuild all");
        assert_eq!(report.pairs, 3);
        // only the book pair has entries to fold
        assert_eq!(report.entries, 3);
    }

    #[test]
    fn rebuild_of_unprovisioned_pair_is_fatal() {
        let (mut conn, user) = store_with_entries();
        let err = rebuild_pair(&mut conn, user, MediaType::Anime, 5_000).unwrap_err();
        assert!(matches!(err, StatsError::MissingAggregate { .. }));
    }
}
