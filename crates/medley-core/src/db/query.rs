//! Typed query helpers for the stats database.
//!
//! Provides the read/provision side of the storage interface: aggregate
//! reads, user management, snapshot ranges, list entries, and media tags.
//! All functions take a shared `&Connection` and return typed structs,
//! never raw rows; SQL does not escape this module.

use crate::error::{Result, StatsError};
use crate::media::{Dimension, MediaType, Status};
use crate::model::{ListEntry, MediaAggregate, StatsSnapshot};
use rusqlite::{Connection, Row, params, types::Type};
use std::collections::BTreeMap;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A user row. Minimal on purpose: the engine only needs identity and a
/// display name for rankings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub user_id: i64,
    pub name: String,
    pub created_at_us: i64,
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const AGGREGATE_COLUMNS: &str = "user_id, media_type, time_spent_min, total_entries, \
     total_redo, entries_rated, sum_entries_rated, entries_commented, \
     entries_favorites, total_specific, status_counts, active, \
     created_at_us, updated_at_us";

const SNAPSHOT_COLUMNS: &str = "user_id, media_type, recorded_at_us, time_spent_min, \
     total_entries, total_redo, entries_rated, sum_entries_rated, \
     entries_commented, entries_favorites, total_specific, status_counts";

const ENTRY_COLUMNS: &str = "user_id, media_type, media_id, status, rating, is_favorite, \
     has_comment, redo_count, specific, time_spent_min, updated_at_us";

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn media_type_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<MediaType> {
    let raw: String = row.get(idx)?;
    MediaType::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn status_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Status> {
    let raw: String = row.get(idx)?;
    Status::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn status_counts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<BTreeMap<Status, i64>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn encode_status_counts(counts: &BTreeMap<Status, i64>) -> String {
    // BTreeMap with string-serializing keys cannot fail to encode.
    serde_json::to_string(counts).unwrap_or_else(|_| "{}".to_string())
}

pub(crate) fn row_to_aggregate(row: &Row<'_>) -> rusqlite::Result<MediaAggregate> {
    Ok(MediaAggregate {
        user_id: row.get(0)?,
        media_type: media_type_at(row, 1)?,
        time_spent_min: row.get(2)?,
        total_entries: row.get(3)?,
        total_redo: row.get(4)?,
        entries_rated: row.get(5)?,
        sum_entries_rated: row.get(6)?,
        entries_commented: row.get(7)?,
        entries_favorites: row.get(8)?,
        total_specific: row.get(9)?,
        status_counts: status_counts_at(row, 10)?,
        active: row.get(11)?,
        created_at_us: row.get(12)?,
        updated_at_us: row.get(13)?,
    })
}

fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<StatsSnapshot> {
    Ok(StatsSnapshot {
        user_id: row.get(0)?,
        media_type: media_type_at(row, 1)?,
        recorded_at_us: row.get(2)?,
        time_spent_min: row.get(3)?,
        total_entries: row.get(4)?,
        total_redo: row.get(5)?,
        entries_rated: row.get(6)?,
        sum_entries_rated: row.get(7)?,
        entries_commented: row.get(8)?,
        entries_favorites: row.get(9)?,
        total_specific: row.get(10)?,
        status_counts: status_counts_at(row, 11)?,
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<ListEntry> {
    Ok(ListEntry {
        user_id: row.get(0)?,
        media_type: media_type_at(row, 1)?,
        media_id: row.get(2)?,
        status: status_at(row, 3)?,
        rating: row.get(4)?,
        is_favorite: row.get(5)?,
        has_comment: row.get(6)?,
        redo_count: row.get(7)?,
        specific: row.get(8)?,
        time_spent_min: row.get(9)?,
        updated_at_us: row.get(10)?,
    })
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Create a user and return the assigned id.
///
/// # Errors
///
/// Returns a storage error on duplicate names (unique constraint).
pub fn create_user(conn: &Connection, name: &str, now_us: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (name, created_at_us) VALUES (?1, ?2)",
        params![name, now_us],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch a user by id.
pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<UserRow>> {
    optional(conn.query_row(
        "SELECT user_id, name, created_at_us FROM users WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                name: row.get(1)?,
                created_at_us: row.get(2)?,
            })
        },
    ))
}

/// Fetch a user by exact name.
pub fn find_user(conn: &Connection, name: &str) -> Result<Option<UserRow>> {
    optional(conn.query_row(
        "SELECT user_id, name, created_at_us FROM users WHERE name = ?1",
        params![name],
        |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                name: row.get(1)?,
                created_at_us: row.get(2)?,
            })
        },
    ))
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Provision the aggregate row for (user, media type).
///
/// Idempotent: a second call leaves the existing row untouched and returns
/// it. Aggregate rows are never created lazily by delta application.
///
/// # Errors
///
/// Returns a storage error if the insert or readback fails.
pub fn provision(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    now_us: i64,
) -> Result<MediaAggregate> {
    let fresh = MediaAggregate::fresh(user_id, media_type, now_us);
    conn.execute(
        "INSERT OR IGNORE INTO media_aggregates (
            user_id, media_type, status_counts, active, created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        params![
            user_id,
            media_type.as_str(),
            encode_status_counts(&fresh.status_counts),
            now_us
        ],
    )?;
    get_aggregate(conn, user_id, media_type)?.ok_or_else(|| StatsError::MissingAggregate {
        user_id,
        media_type,
    })
}

/// Fetch the aggregate row for (user, media type), if provisioned.
pub fn get_aggregate(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
) -> Result<Option<MediaAggregate>> {
    let sql = format!(
        "SELECT {AGGREGATE_COLUMNS} FROM media_aggregates
         WHERE user_id = ?1 AND media_type = ?2"
    );
    optional(conn.query_row(&sql, params![user_id, media_type.as_str()], row_to_aggregate))
}

/// Fetch the aggregate row or fail with [`StatsError::MissingAggregate`].
pub fn require_aggregate(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
) -> Result<MediaAggregate> {
    get_aggregate(conn, user_id, media_type)?.ok_or(StatsError::MissingAggregate {
        user_id,
        media_type,
    })
}

/// All aggregate rows for one user, in media-type order.
pub fn list_user_aggregates(conn: &Connection, user_id: i64) -> Result<Vec<MediaAggregate>> {
    let sql = format!(
        "SELECT {AGGREGATE_COLUMNS} FROM media_aggregates
         WHERE user_id = ?1 ORDER BY media_type"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], row_to_aggregate)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every provisioned (user, media type) pair, for maintenance jobs.
pub fn list_provisioned(conn: &Connection) -> Result<Vec<(i64, MediaType)>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, media_type FROM media_aggregates ORDER BY user_id, media_type",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, media_type_at(row, 1)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Toggle the ranking opt-in flag. Returns false when the row is missing.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub fn set_active(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    active: bool,
    now_us: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE media_aggregates SET active = ?3, updated_at_us = ?4
         WHERE user_id = ?1 AND media_type = ?2",
        params![user_id, media_type.as_str(), active, now_us],
    )?;
    Ok(changed > 0)
}

/// Overwrite the totals of an existing aggregate row.
///
/// Only the applicator and the rebuild job call this, always inside a
/// transaction they own. The `active` flag and `created_at_us` are
/// deliberately not touched.
pub(crate) fn store_totals(conn: &Connection, agg: &MediaAggregate) -> Result<()> {
    let changed = conn.execute(
        "UPDATE media_aggregates SET
            time_spent_min = ?3,
            total_entries = ?4,
            total_redo = ?5,
            entries_rated = ?6,
            sum_entries_rated = ?7,
            entries_commented = ?8,
            entries_favorites = ?9,
            total_specific = ?10,
            status_counts = ?11,
            updated_at_us = ?12
         WHERE user_id = ?1 AND media_type = ?2",
        params![
            agg.user_id,
            agg.media_type.as_str(),
            agg.time_spent_min,
            agg.total_entries,
            agg.total_redo,
            agg.entries_rated,
            agg.sum_entries_rated,
            agg.entries_commented,
            agg.entries_favorites,
            agg.total_specific,
            encode_status_counts(&agg.status_counts),
            agg.updated_at_us,
        ],
    )?;
    if changed == 0 {
        return Err(StatsError::MissingAggregate {
            user_id: agg.user_id,
            media_type: agg.media_type,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// History snapshots
// ---------------------------------------------------------------------------

/// Insert one history snapshot row.
pub(crate) fn insert_snapshot(conn: &Connection, snap: &StatsSnapshot) -> Result<i64> {
    conn.execute(
        "INSERT INTO stats_history (
            user_id, media_type, recorded_at_us, time_spent_min, total_entries,
            total_redo, entries_rated, sum_entries_rated, entries_commented,
            entries_favorites, total_specific, status_counts
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            snap.user_id,
            snap.media_type.as_str(),
            snap.recorded_at_us,
            snap.time_spent_min,
            snap.total_entries,
            snap.total_redo,
            snap.entries_rated,
            snap.sum_entries_rated,
            snap.entries_commented,
            snap.entries_favorites,
            snap.total_specific,
            encode_status_counts(&snap.status_counts),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Ordered snapshots in `[start_us, end_us]`, oldest first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn range_of(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    start_us: i64,
    end_us: i64,
) -> Result<Vec<StatsSnapshot>> {
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM stats_history
         WHERE user_id = ?1 AND media_type = ?2
           AND recorded_at_us >= ?3 AND recorded_at_us <= ?4
         ORDER BY recorded_at_us ASC, snapshot_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![user_id, media_type.as_str(), start_us, end_us],
        row_to_snapshot,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Latest snapshot strictly before `t_us`, used as a trend baseline when
/// the requested window starts mid-series.
pub fn last_before(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    t_us: i64,
) -> Result<Option<StatsSnapshot>> {
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM stats_history
         WHERE user_id = ?1 AND media_type = ?2 AND recorded_at_us < ?3
         ORDER BY recorded_at_us DESC, snapshot_id DESC
         LIMIT 1"
    );
    optional(conn.query_row(&sql, params![user_id, media_type.as_str(), t_us], row_to_snapshot))
}

// ---------------------------------------------------------------------------
// List entries
// ---------------------------------------------------------------------------

/// Fetch one list entry.
pub fn get_entry(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    media_id: i64,
) -> Result<Option<ListEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM list_entries
         WHERE user_id = ?1 AND media_type = ?2 AND media_id = ?3"
    );
    optional(conn.query_row(
        &sql,
        params![user_id, media_type.as_str(), media_id],
        row_to_entry,
    ))
}

/// Insert or replace a list entry.
///
/// # Errors
///
/// Returns [`StatsError::ConstraintViolation`] when the entry's status is
/// outside its media type's vocabulary, or a storage error.
pub fn upsert_entry(conn: &Connection, entry: &ListEntry) -> Result<()> {
    if !entry.media_type.supports_status(entry.status) {
        return Err(StatsError::constraint(
            entry.user_id,
            entry.media_type,
            format!(
                "status '{}' not in {} vocabulary",
                entry.status, entry.media_type
            ),
        ));
    }
    conn.execute(
        "INSERT INTO list_entries (
            user_id, media_type, media_id, status, rating, is_favorite,
            has_comment, redo_count, specific, time_spent_min, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (user_id, media_type, media_id) DO UPDATE SET
            status = excluded.status,
            rating = excluded.rating,
            is_favorite = excluded.is_favorite,
            has_comment = excluded.has_comment,
            redo_count = excluded.redo_count,
            specific = excluded.specific,
            time_spent_min = excluded.time_spent_min,
            updated_at_us = excluded.updated_at_us",
        params![
            entry.user_id,
            entry.media_type.as_str(),
            entry.media_id,
            entry.status.as_str(),
            entry.rating,
            entry.is_favorite,
            entry.has_comment,
            entry.redo_count,
            entry.specific,
            entry.time_spent_min,
            entry.updated_at_us,
        ],
    )?;
    Ok(())
}

/// Delete a list entry. Returns false when it did not exist.
pub fn delete_entry(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    media_id: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM list_entries WHERE user_id = ?1 AND media_type = ?2 AND media_id = ?3",
        params![user_id, media_type.as_str(), media_id],
    )?;
    Ok(changed > 0)
}

/// All list entries for (user, media type), in media-id order.
pub fn list_entries(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
) -> Result<Vec<ListEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM list_entries
         WHERE user_id = ?1 AND media_type = ?2
         ORDER BY media_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, media_type.as_str()], row_to_entry)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Media tags
// ---------------------------------------------------------------------------

/// Attach a dimension value to a media item (idempotent).
///
/// # Errors
///
/// Returns [`StatsError::UnsupportedDimension`] when the dimension does not
/// exist for the media type.
pub fn tag_media(
    conn: &Connection,
    media_type: MediaType,
    media_id: i64,
    dimension: Dimension,
    value: &str,
) -> Result<()> {
    if !media_type.supports_dimension(dimension) {
        return Err(StatsError::UnsupportedDimension {
            media_type,
            dimension: dimension.to_string(),
        });
    }
    conn.execute(
        "INSERT OR IGNORE INTO media_tags (media_type, media_id, dimension, value)
         VALUES (?1, ?2, ?3, ?4)",
        params![media_type.as_str(), media_id, dimension.as_str(), value],
    )?;
    Ok(())
}

/// All (dimension, value) tags on one media item.
pub fn tags_for(
    conn: &Connection,
    media_type: MediaType,
    media_id: i64,
) -> Result<Vec<(Dimension, String)>> {
    let mut stmt = conn.prepare(
        "SELECT dimension, value FROM media_tags
         WHERE media_type = ?1 AND media_id = ?2
         ORDER BY dimension, value",
    )?;
    let rows = stmt.query_map(params![media_type.as_str(), media_id], |row| {
        let raw: String = row.get(0)?;
        let dimension = Dimension::from_str(&raw).map_err(|e| conversion_err(0, e))?;
        Ok((dimension, row.get::<_, String>(1)?))
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
