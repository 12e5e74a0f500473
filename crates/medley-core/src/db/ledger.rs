//! Activity ledger reads and the explicit correction path.
//!
//! The ledger is append-only: rows are written by the applicator and never
//! updated in normal operation. The single exception is the correction
//! path (`amend_event` / `forget_event`) for data-entry fixes. Corrections
//! touch *only* the ledger row: aggregates and history snapshots are never
//! re-derived automatically. When a correction changes historical totals,
//! the operator issues a compensating delta through the normal apply path
//! (or runs a full rebuild).

use crate::error::{Result, StatsError};
use crate::media::MediaType;
use crate::model::ActivityEvent;
use rusqlite::{Connection, Row, params};

const EVENT_COLUMNS: &str = "event_id, user_id, media_id, media_type, specific_gained, \
     is_completed, is_redo, created_at_us";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<ActivityEvent> {
    Ok(ActivityEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        media_id: row.get(2)?,
        media_type: super::query::media_type_at(row, 3)?,
        specific_gained: row.get(4)?,
        is_completed: row.get(5)?,
        is_redo: row.get(6)?,
        created_at_us: row.get(7)?,
    })
}

/// Fetch one ledger event by id.
pub fn get_event(conn: &Connection, event_id: i64) -> Result<Option<ActivityEvent>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM activity_log WHERE event_id = ?1");
    match conn.query_row(&sql, params![event_id], row_to_event) {
        Ok(event) => Ok(Some(event)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Most recent events for a user, optionally narrowed to one media type.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn recent_events(
    conn: &Connection,
    user_id: i64,
    media_type: Option<MediaType>,
    limit: u32,
) -> Result<Vec<ActivityEvent>> {
    let mut events = Vec::new();
    if let Some(mt) = media_type {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM activity_log
             WHERE user_id = ?1 AND media_type = ?2
             ORDER BY created_at_us DESC, event_id DESC
             LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, mt.as_str(), limit], row_to_event)?;
        for row in rows {
            events.push(row?);
        }
    } else {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM activity_log
             WHERE user_id = ?1
             ORDER BY created_at_us DESC, event_id DESC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, limit], row_to_event)?;
        for row in rows {
            events.push(row?);
        }
    }
    Ok(events)
}

/// Events in `[start_us, end_us]` for (user, media type), oldest first.
///
/// This is the per-event detail path — e.g. finding which action caused a
/// spike a trend chart surfaced. Totals come from snapshots, not from
/// re-aggregating these rows.
pub fn events_between(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    start_us: i64,
    end_us: i64,
) -> Result<Vec<ActivityEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM activity_log
         WHERE user_id = ?1 AND media_type = ?2
           AND created_at_us >= ?3 AND created_at_us <= ?4
         ORDER BY created_at_us ASC, event_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![user_id, media_type.as_str(), start_us, end_us],
        row_to_event,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Fields of a ledger event that a correction may change.
///
/// Unset fields keep their stored values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventAmendment {
    pub specific_gained: Option<i64>,
    pub is_completed: Option<bool>,
    pub is_redo: Option<bool>,
}

/// Amend one ledger event (data-entry fix) and return the updated row.
///
/// Does not touch aggregates or snapshots; issue a compensating delta if
/// the correction changes historical totals.
///
/// # Errors
///
/// Returns [`StatsError::EventNotFound`] when the id does not exist.
pub fn amend_event(
    conn: &Connection,
    event_id: i64,
    amendment: EventAmendment,
) -> Result<ActivityEvent> {
    let changed = conn.execute(
        "UPDATE activity_log SET
            specific_gained = COALESCE(?2, specific_gained),
            is_completed = COALESCE(?3, is_completed),
            is_redo = COALESCE(?4, is_redo)
         WHERE event_id = ?1",
        params![
            event_id,
            amendment.specific_gained,
            amendment.is_completed,
            amendment.is_redo
        ],
    )?;
    if changed == 0 {
        return Err(StatsError::EventNotFound(event_id));
    }
    get_event(conn, event_id)?.ok_or(StatsError::EventNotFound(event_id))
}

/// Delete one ledger event (data-entry fix).
///
/// Does not touch aggregates or snapshots; issue a compensating delta if
/// the deletion changes historical totals.
///
/// # Errors
///
/// Returns [`StatsError::EventNotFound`] when the id does not exist.
pub fn forget_event(conn: &Connection, event_id: i64) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM activity_log WHERE event_id = ?1",
        params![event_id],
    )?;
    if changed == 0 {
        return Err(StatsError::EventNotFound(event_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{apply, migrations, query};
    use crate::media::Status;
    use crate::model::Delta;
    use std::collections::BTreeMap;

    fn conn_with_events() -> (Connection, i64, Vec<i64>) {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        let user = query::create_user(&conn, "iris", 0).expect("create user");
        query::provision(&conn, user, MediaType::Series, 0).expect("provision");

        let mut event_ids = Vec::new();
        for (i, at) in [1_000_i64, 2_000, 3_000].iter().enumerate() {
            let delta = Delta {
                total_entries: 1,
                specific: 4,
                time_spent_min: 160,
                status_counts: BTreeMap::from([(Status::Completed, 1)]),
                ..Delta::default()
            };
            let outcome = apply::apply_delta(
                &mut conn,
                user,
                MediaType::Series,
                i64::try_from(i).expect("small") + 10,
                &delta,
                *at,
            )
            .expect("apply");
            event_ids.push(outcome.event_id);
        }
        (conn, user, event_ids)
    }

    #[test]
    fn recent_events_are_newest_first_and_limited() {
        let (conn, user, _ids) = conn_with_events();

        let events = recent_events(&conn, user, Some(MediaType::Series), 2).expect("recent");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].created_at_us, 3_000);
        assert_eq!(events[1].created_at_us, 2_000);

        let all = recent_events(&conn, user, None, 10).expect("recent all");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn events_between_is_inclusive_and_ordered() {
        let (conn, user, _ids) = conn_with_events();
        let events =
            events_between(&conn, user, MediaType::Series, 1_000, 2_000).expect("window");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].created_at_us, 1_000);
        assert_eq!(events[1].created_at_us, 2_000);
    }

    #[test]
    fn amend_changes_only_named_fields_and_leaves_aggregate_alone() {
        let (conn, user, ids) = conn_with_events();
        let before = query::require_aggregate(&conn, user, MediaType::Series).expect("read");

        let updated = amend_event(
            &conn,
            ids[0],
            EventAmendment {
                specific_gained: Some(6),
                ..EventAmendment::default()
            },
        )
        .expect("amend");
        assert_eq!(updated.specific_gained, 6);
        assert!(updated.is_completed); // untouched

        // the aggregate is deliberately not re-derived
        let after = query::require_aggregate(&conn, user, MediaType::Series).expect("read");
        assert_eq!(after, before);
    }

    #[test]
    fn forget_removes_the_row_only() {
        let (conn, user, ids) = conn_with_events();
        let before = query::require_aggregate(&conn, user, MediaType::Series).expect("read");

        forget_event(&conn, ids[1]).expect("forget");
        assert!(get_event(&conn, ids[1]).expect("query").is_none());

        let after = query::require_aggregate(&conn, user, MediaType::Series).expect("read");
        assert_eq!(after, before);
    }

    #[test]
    fn corrections_on_missing_ids_fail() {
        let (conn, _user, _ids) = conn_with_events();
        assert!(matches!(
            amend_event(&conn, 9_999, EventAmendment::default()),
            Err(StatsError::EventNotFound(9_999))
        ));
        assert!(matches!(
            forget_event(&conn, 9_999),
            Err(StatsError::EventNotFound(9_999))
        ));
    }
}
