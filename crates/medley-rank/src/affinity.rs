//! Affinity scoring: "top genres", "top actors", "top platforms".
//!
//! For one (media type, dimension) the scorer groups list entries by tag
//! value and turns each group's quality and engagement into a bounded
//! 0–10 score. Scores are recomputed per request and never persisted:
//! they depend on request-scoped inputs (media type, dimension, user or
//! global scope), and staleness against live writes is acceptable.

use medley_core::db::query;
use medley_core::error::{Result, StatsError};
use medley_core::media::{Dimension, MediaType, Status};
use rusqlite::{Connection, Row, named_params};
use serde::Serialize;

/// Result rows are truncated to this many values.
pub const TOP_N: usize = 10;

/// Groups smaller than this are statistically meaningless and excluded.
pub const MIN_GROUP: i64 = 3;

/// Mid-scale reference rating used when no average is available.
const MID_SCALE: f64 = 5.0;

/// Raw per-value statistics before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub value: String,
    pub entries: i64,
    /// Mean of the ratings present in the group; `None` when nothing in
    /// the group is rated.
    pub avg_rating: Option<f64>,
    pub favorites: i64,
}

/// One scored dimension value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityRow {
    pub value: String,
    pub entries: i64,
    pub avg_rating: f64,
    pub favorites: i64,
    pub affinity: f64,
}

/// Score groups against a reference average rating.
///
/// `reference_avg` is the scope's overall average rating (the user's, or
/// the population's for a global scope); when absent or non-positive the
/// mid-scale 5.0 stands in. Groups below [`MIN_GROUP`] are dropped; the
/// survivors are sorted by descending affinity, ties broken by value name,
/// and truncated to [`TOP_N`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_groups(groups: Vec<GroupStats>, reference_avg: Option<f64>) -> Vec<AffinityRow> {
    let reference = reference_avg.filter(|avg| *avg > 0.0).unwrap_or(MID_SCALE);

    let mut rows: Vec<AffinityRow> = groups
        .into_iter()
        .filter(|g| g.entries >= MIN_GROUP)
        .map(|g| {
            let entries = g.entries as f64;
            let avg_rating = g.avg_rating.unwrap_or(reference);
            let quality_factor = avg_rating / reference;
            let favorite_boost = 1.0 + g.favorites as f64 / entries;
            let confidence = (entries + 1.0).ln() / 3.0;
            // saturating transform: high signals approach 10, never exceed it
            let affinity = 10.0 * (quality_factor * favorite_boost * confidence).tanh();
            AffinityRow {
                value: g.value,
                entries: g.entries,
                avg_rating,
                favorites: g.favorites,
                affinity,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.affinity
            .total_cmp(&a.affinity)
            .then_with(|| a.value.cmp(&b.value))
    });
    rows.truncate(TOP_N);
    rows
}

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<GroupStats> {
    Ok(GroupStats {
        value: row.get(0)?,
        entries: row.get(1)?,
        avg_rating: row.get(2)?,
        favorites: row.get(3)?,
    })
}

/// Top dimension values for one user, or across the population when
/// `user_id` is `None`.
///
/// Planned entries carry no consumption signal and are excluded before
/// grouping. The reference average for a user scope is the maintained
/// aggregate's derived average rating; a population scope averages every
/// rating of the media type.
///
/// # Errors
///
/// Returns [`StatsError::UnsupportedDimension`] when the dimension does
/// not exist for the media type, or a storage error.
pub fn top_values(
    conn: &Connection,
    media_type: MediaType,
    dimension: Dimension,
    user_id: Option<i64>,
) -> Result<Vec<AffinityRow>> {
    if !media_type.supports_dimension(dimension) {
        return Err(StatsError::UnsupportedDimension {
            media_type,
            dimension: dimension.to_string(),
        });
    }
    let planned = Status::Planned.as_str();

    let mut groups = Vec::new();
    let reference_avg = if let Some(user_id) = user_id {
        let sql = format!(
            "SELECT t.value,
                    COUNT(*) AS entries,
                    AVG(e.rating) AS avg_rating,
                    SUM(CASE WHEN e.is_favorite = 1 THEN 1 ELSE 0 END) AS favorites
             FROM list_entries e
             JOIN media_tags t
               ON t.media_type = e.media_type AND t.media_id = e.media_id
             WHERE e.media_type = :media_type
               AND e.user_id = :user_id
               AND e.status <> '{planned}'
               AND t.dimension = :dimension
             GROUP BY t.value
             HAVING COUNT(*) >= {MIN_GROUP}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map(
            named_params! {
                ":media_type": media_type.as_str(),
                ":user_id": user_id,
                ":dimension": dimension.as_str(),
            },
            row_to_group,
        )?;
        for row in mapped {
            groups.push(row?);
        }
        query::get_aggregate(conn, user_id, media_type)?.and_then(|agg| agg.average_rating())
    } else {
        let sql = format!(
            "SELECT t.value,
                    COUNT(*) AS entries,
                    AVG(e.rating) AS avg_rating,
                    SUM(CASE WHEN e.is_favorite = 1 THEN 1 ELSE 0 END) AS favorites
             FROM list_entries e
             JOIN media_tags t
               ON t.media_type = e.media_type AND t.media_id = e.media_id
             WHERE e.media_type = :media_type
               AND e.status <> '{planned}'
               AND t.dimension = :dimension
             GROUP BY t.value
             HAVING COUNT(*) >= {MIN_GROUP}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map(
            named_params! {
                ":media_type": media_type.as_str(),
                ":dimension": dimension.as_str(),
            },
            row_to_group,
        )?;
        for row in mapped {
            groups.push(row?);
        }
        conn.query_row(
            &format!(
                "SELECT AVG(rating) FROM list_entries
                 WHERE media_type = ?1 AND status <> '{planned}' AND rating IS NOT NULL"
            ),
            [media_type.as_str()],
            |row| row.get::<_, Option<f64>>(0),
        )?
    };

    let rows = score_groups(groups, reference_avg);
    tracing::debug!(
        media_type = %media_type,
        dimension = %dimension,
        user_id,
        values = rows.len(),
        "affinity scored"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_core::db::migrations;
    use medley_core::model::ListEntry;

    fn group(value: &str, entries: i64, avg: Option<f64>, favorites: i64) -> GroupStats {
        GroupStats {
            value: value.into(),
            entries,
            avg_rating: avg,
            favorites,
        }
    }

    #[test]
    fn small_groups_are_excluded() {
        let rows = score_groups(
            vec![group("Drama", 2, Some(10.0), 2), group("Crime", 3, Some(6.0), 0)],
            Some(6.0),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "Crime");
    }

    #[test]
    fn larger_sample_with_equal_ratios_scores_higher() {
        // identical quality and favorite ratio; only volume differs
        let rows = score_groups(
            vec![
                group("Niche", 3, Some(7.0), 1),
                group("Staple", 300, Some(7.0), 100),
            ],
            Some(7.0),
        );
        assert_eq!(rows[0].value, "Staple");
        assert!(rows[0].affinity > rows[1].affinity);
    }

    #[test]
    fn affinity_stays_below_ten_even_for_absurd_signals() {
        // quality factor 100, maximal favorite boost, huge sample
        let rows = score_groups(vec![group("Hype", 100_000, Some(10.0), 100_000)], Some(0.1));
        assert!(rows[0].affinity < 10.0);
        assert!(rows[0].affinity > 9.9);
    }

    #[test]
    fn unrated_group_falls_back_to_the_reference() {
        let rows = score_groups(vec![group("Quiet", 5, None, 0)], Some(8.0));
        assert!((rows[0].avg_rating - 8.0).abs() < 1e-9);
        // quality factor 1, no favorites: affinity is pure confidence
        let expected = 10.0 * ((6.0_f64).ln() / 3.0).tanh();
        assert!((rows[0].affinity - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_reference_uses_mid_scale() {
        let with_none = score_groups(vec![group("G", 4, Some(5.0), 0)], None);
        let with_zero = score_groups(vec![group("G", 4, Some(5.0), 0)], Some(0.0));
        assert!((with_none[0].affinity - with_zero[0].affinity).abs() < 1e-12);
    }

    #[test]
    fn ties_break_by_value_name() {
        let rows = score_groups(
            vec![
                group("Zeta", 10, Some(7.0), 2),
                group("Alpha", 10, Some(7.0), 2),
            ],
            Some(7.0),
        );
        assert_eq!(rows[0].value, "Alpha");
        assert_eq!(rows[1].value, "Zeta");
    }

    fn seeded() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        let user = query::create_user(&conn, "ana", 0).expect("create user");
        query::provision(&conn, user, MediaType::Series, 0).expect("provision");

        // four crime series (one favorite, rated well), three planned dramas
        for media_id in 1..=4 {
            query::upsert_entry(
                &conn,
                &ListEntry {
                    user_id: user,
                    media_type: MediaType::Series,
                    media_id,
                    status: Status::Completed,
                    rating: Some(8.0),
                    is_favorite: media_id == 1,
                    has_comment: false,
                    redo_count: 0,
                    specific: 10,
                    time_spent_min: 400,
                    updated_at_us: 0,
                },
            )
            .expect("upsert");
            query::tag_media(&conn, MediaType::Series, media_id, Dimension::Genre, "Crime")
                .expect("tag");
        }
        for media_id in 5..=7 {
            query::upsert_entry(
                &conn,
                &ListEntry {
                    user_id: user,
                    media_type: MediaType::Series,
                    media_id,
                    status: Status::Planned,
                    rating: None,
                    is_favorite: false,
                    has_comment: false,
                    redo_count: 0,
                    specific: 0,
                    time_spent_min: 0,
                    updated_at_us: 0,
                },
            )
            .expect("upsert");
            query::tag_media(&conn, MediaType::Series, media_id, Dimension::Genre, "Drama")
                .expect("tag");
        }
        (conn, user)
    }

    #[test]
    fn storage_scope_excludes_planned_and_small_groups() {
        let (conn, user) = seeded();
        let rows =
            top_values(&conn, MediaType::Series, Dimension::Genre, Some(user)).expect("rank");
        assert_eq!(rows.len(), 1, "planned dramas must not form a group");
        assert_eq!(rows[0].value, "Crime");
        assert_eq!(rows[0].entries, 4);
        assert_eq!(rows[0].favorites, 1);
        assert!(rows[0].affinity > 0.0 && rows[0].affinity < 10.0);
    }

    #[test]
    fn foreign_dimension_is_rejected() {
        let (conn, user) = seeded();
        let err = top_values(&conn, MediaType::Series, Dimension::Author, Some(user)).unwrap_err();
        assert!(matches!(err, StatsError::UnsupportedDimension { .. }));
    }

    // === Property tests =====================================================

    use proptest::prelude::*;

    fn arb_group() -> impl Strategy<Value = GroupStats> {
        (
            "[a-z]{1,12}",
            0_i64..=5_000,
            proptest::option::of(0.0_f64..=10.0),
            0_i64..=5_000,
        )
            .prop_map(|(value, entries, avg_rating, favorites)| GroupStats {
                value,
                entries,
                avg_rating,
                favorites: favorites.min(entries),
            })
    }

    proptest! {
        #[test]
        fn scores_stay_bounded_sorted_and_page_sized(
            groups in prop::collection::vec(arb_group(), 0..64),
            reference in proptest::option::of(-2.0_f64..=10.0),
        ) {
            let rows = score_groups(groups, reference);
            prop_assert!(rows.len() <= TOP_N);
            for row in &rows {
                prop_assert!(row.entries >= MIN_GROUP);
                prop_assert!(row.affinity >= 0.0 && row.affinity < 10.0);
            }
            for pair in rows.windows(2) {
                prop_assert!(pair[0].affinity >= pair[1].affinity);
            }
        }
    }
}
