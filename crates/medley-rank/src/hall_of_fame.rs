//! The cross-media-type hall of fame.
//!
//! Every active aggregate is normalized against its media type's maximum
//! time spent, so a user who leads their peers in several types outranks a
//! single-type specialist with huge raw hours. Ranks are always assigned
//! over the full population; name search and pagination only shape the
//! returned page, and the requesting user's own row rides along
//! out-of-band so "you are #N" works from any page.

use medley_core::error::Result;
use medley_core::media::{MediaType, UnknownMediaType};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---- Sort keys ----

/// Which total ordering drives sort and pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Sum of per-type normalized scores (cross-type fairness).
    TotalScore,
    /// Sum of raw minutes across active types.
    TotalTime,
    /// One media type's raw minutes (specialist leaderboard).
    Type(MediaType),
}

/// Error returned when parsing an unknown sort key string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortKey {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown sort key '{}' (expected score, time or a media type)",
            self.raw
        )
    }
}

impl std::error::Error for UnknownSortKey {}

impl SortKey {
    /// Canonical lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TotalScore => "score",
            Self::TotalTime => "time",
            Self::Type(media_type) => media_type.as_str(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(Self::TotalScore),
            "time" => Ok(Self::TotalTime),
            other => other
                .parse::<MediaType>()
                .map(Self::Type)
                .map_err(|UnknownMediaType { raw }| UnknownSortKey { raw }),
        }
    }
}

// ---- Rows ----

/// One media type's contribution to a user's standing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypeStanding {
    pub time_spent_min: i64,
    /// `time_spent_min / max(time over active users of the type)`, 0 when
    /// the type's maximum is 0.
    pub normalized: f64,
}

/// One ranked user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HofRow {
    /// 1-based position in the chosen ordering, over the full population.
    pub rank: usize,
    pub user_id: i64,
    pub name: String,
    pub total_score: f64,
    pub total_time_min: i64,
    pub types: BTreeMap<MediaType, TypeStanding>,
}

/// One page of the hall of fame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HofPage {
    /// Rows matching the search filter, across all pages.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub rows: Vec<HofRow>,
    /// The requesting user's own standing, independent of the page.
    pub requester: Option<HofRow>,
}

// ---- Composition ----

fn load_active(conn: &Connection) -> Result<Vec<(i64, String, MediaType, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT a.user_id, u.name, a.media_type, a.time_spent_min
         FROM media_aggregates a
         JOIN users u ON u.user_id = a.user_id
         WHERE a.active = 1
         ORDER BY a.user_id, a.media_type",
    )?;
    let rows = stmt.query_map([], |row| {
        let media_type: String = row.get(2)?;
        let media_type = media_type.parse::<MediaType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok((row.get(0)?, row.get(1)?, media_type, row.get(3)?))
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Fold raw (user, name, type, time) rows into per-user standings.
#[allow(clippy::cast_precision_loss)]
fn compose(raw: Vec<(i64, String, MediaType, i64)>) -> Vec<HofRow> {
    let mut max_per_type: BTreeMap<MediaType, i64> = BTreeMap::new();
    for (_, _, media_type, time_spent_min) in &raw {
        let max = max_per_type.entry(*media_type).or_insert(0);
        *max = (*max).max(*time_spent_min);
    }

    let mut users: BTreeMap<i64, HofRow> = BTreeMap::new();
    for (user_id, name, media_type, time_spent_min) in raw {
        let max = max_per_type.get(&media_type).copied().unwrap_or(0);
        let normalized = if max > 0 {
            time_spent_min as f64 / max as f64
        } else {
            0.0
        };
        let row = users.entry(user_id).or_insert_with(|| HofRow {
            rank: 0,
            user_id,
            name,
            total_score: 0.0,
            total_time_min: 0,
            types: BTreeMap::new(),
        });
        row.total_score += normalized;
        row.total_time_min += time_spent_min;
        row.types.insert(
            media_type,
            TypeStanding {
                time_spent_min,
                normalized,
            },
        );
    }
    users.into_values().collect()
}

fn type_time(row: &HofRow, media_type: MediaType) -> i64 {
    row.types
        .get(&media_type)
        .map_or(0, |standing| standing.time_spent_min)
}

/// Sort descending by the chosen key and assign 1-based ranks by position.
/// Ties break by ascending user id, so ranks are total and reproducible.
fn sort_and_rank(rows: &mut [HofRow], sort: SortKey) {
    match sort {
        SortKey::TotalScore => rows.sort_by(|a, b| {
            b.total_score
                .total_cmp(&a.total_score)
                .then_with(|| a.user_id.cmp(&b.user_id))
        }),
        SortKey::TotalTime => rows.sort_by(|a, b| {
            b.total_time_min
                .cmp(&a.total_time_min)
                .then_with(|| a.user_id.cmp(&b.user_id))
        }),
        SortKey::Type(media_type) => rows.sort_by(|a, b| {
            type_time(b, media_type)
                .cmp(&type_time(a, media_type))
                .then_with(|| a.user_id.cmp(&b.user_id))
        }),
    }
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index + 1;
    }
}

/// One hall-of-fame page.
///
/// `page` is 1-based (0 is treated as 1). `requester`'s standing is looked
/// up before the search filter, so it is present even when the search or
/// the page excludes it.
///
/// # Errors
///
/// Returns a storage error if the aggregate read fails.
pub fn hall_of_fame(
    conn: &Connection,
    sort: SortKey,
    search: Option<&str>,
    page: usize,
    per_page: usize,
    requester: Option<i64>,
) -> Result<HofPage> {
    let mut rows = compose(load_active(conn)?);
    sort_and_rank(&mut rows, sort);

    let requester_row =
        requester.and_then(|id| rows.iter().find(|row| row.user_id == id).cloned());

    let filtered: Vec<HofRow> = match search {
        Some(needle) if !needle.is_empty() => {
            let needle = needle.to_lowercase();
            rows.into_iter()
                .filter(|row| row.name.to_lowercase().contains(&needle))
                .collect()
        }
        _ => rows,
    };

    let total = filtered.len();
    let page = page.max(1);
    let start = (page - 1).saturating_mul(per_page);
    let rows: Vec<HofRow> = filtered.into_iter().skip(start).take(per_page).collect();

    tracing::debug!(sort = %sort, total, page, returned = rows.len(), "hall of fame ranked");
    Ok(HofPage {
        total,
        page,
        per_page,
        rows,
        requester: requester_row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_core::db::{apply, migrations, query};
    use medley_core::model::Delta;

    fn add_time(conn: &mut Connection, user: i64, media_type: MediaType, minutes: i64) {
        query::provision(conn, user, media_type, 0).expect("provision");
        let delta = Delta {
            time_spent_min: minutes,
            ..Delta::default()
        };
        apply::apply_delta(conn, user, media_type, 1, &delta, 0).expect("apply");
    }

    /// ana: 600 series minutes. ben: 300 series + 300 anime. cho: 150 anime.
    fn seeded() -> (Connection, i64, i64, i64) {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        let ana = query::create_user(&conn, "ana", 0).expect("create user");
        let ben = query::create_user(&conn, "ben", 0).expect("create user");
        let cho = query::create_user(&conn, "cho", 0).expect("create user");
        add_time(&mut conn, ana, MediaType::Series, 600);
        add_time(&mut conn, ben, MediaType::Series, 300);
        add_time(&mut conn, ben, MediaType::Anime, 300);
        add_time(&mut conn, cho, MediaType::Anime, 150);
        (conn, ana, ben, cho)
    }

    #[test]
    fn sort_keys_parse() {
        assert_eq!("score".parse::<SortKey>().expect("parse"), SortKey::TotalScore);
        assert_eq!("time".parse::<SortKey>().expect("parse"), SortKey::TotalTime);
        assert_eq!(
            "anime".parse::<SortKey>().expect("parse"),
            SortKey::Type(MediaType::Anime)
        );
        assert!("vibes".parse::<SortKey>().is_err());
    }

    #[test]
    fn type_leader_normalizes_to_exactly_one() {
        let (conn, ana, ben, _cho) = seeded();
        let hof = hall_of_fame(&conn, SortKey::TotalScore, None, 1, 10, None).expect("rank");

        let ana_row = hof.rows.iter().find(|r| r.user_id == ana).expect("ana");
        let series = ana_row.types[&MediaType::Series];
        assert!((series.normalized - 1.0).abs() < f64::EPSILON);

        let ben_row = hof.rows.iter().find(|r| r.user_id == ben).expect("ben");
        assert!((ben_row.types[&MediaType::Series].normalized - 0.5).abs() < 1e-12);
        assert!((ben_row.types[&MediaType::Anime].normalized - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cross_type_dedication_beats_raw_hours_on_the_score_board() {
        let (conn, ana, ben, _cho) = seeded();

        // ben: 0.5 + 1.0 = 1.5 normalized; ana: 1.0 with more raw series time
        let by_score = hall_of_fame(&conn, SortKey::TotalScore, None, 1, 10, None).expect("rank");
        assert_eq!(by_score.rows[0].user_id, ben);
        assert_eq!(by_score.rows[0].rank, 1);
        assert_eq!(by_score.rows[1].user_id, ana);

        // raw hours: ana 600 == ben 600, tie broken by lower user id
        let by_time = hall_of_fame(&conn, SortKey::TotalTime, None, 1, 10, None).expect("rank");
        assert_eq!(by_time.rows[0].user_id, ana);
        assert_eq!(by_time.rows[1].user_id, ben);

        // anime specialists: ben 300, cho 150, ana absent with zero
        let by_anime = hall_of_fame(&conn, SortKey::Type(MediaType::Anime), None, 1, 10, None)
            .expect("rank");
        assert_eq!(by_anime.rows[0].user_id, ben);
        assert_eq!(type_time(&by_anime.rows[2], MediaType::Anime), 0);
    }

    #[test]
    fn search_filters_the_page_but_not_the_ranks() {
        let (conn, _ana, ben, _cho) = seeded();
        let hof =
            hall_of_fame(&conn, SortKey::TotalScore, Some("BE"), 1, 10, None).expect("rank");
        assert_eq!(hof.total, 1);
        assert_eq!(hof.rows.len(), 1);
        assert_eq!(hof.rows[0].user_id, ben);
        assert_eq!(hof.rows[0].rank, 1, "rank comes from the full population");
    }

    #[test]
    fn requester_rank_is_returned_even_off_page() {
        let (conn, _ana, _ben, cho) = seeded();
        let hof = hall_of_fame(&conn, SortKey::TotalScore, Some("a"), 1, 10, Some(cho))
            .expect("rank");
        // the search page holds only ana, yet cho's standing rides along
        assert!(hof.rows.iter().all(|r| r.user_id != cho));
        let requester = hof.requester.expect("requester standing");
        assert_eq!(requester.user_id, cho);
        assert_eq!(requester.rank, 3);
    }

    #[test]
    fn pagination_slices_the_filtered_ordering() {
        let (conn, ana, _ben, cho) = seeded();
        let page2 =
            hall_of_fame(&conn, SortKey::TotalScore, None, 2, 1, None).expect("rank");
        assert_eq!(page2.total, 3);
        assert_eq!(page2.rows.len(), 1);
        assert_eq!(page2.rows[0].user_id, ana, "second by score");
        assert_eq!(page2.rows[0].rank, 2);

        let beyond = hall_of_fame(&conn, SortKey::TotalScore, None, 9, 2, None).expect("rank");
        assert!(beyond.rows.is_empty());
        assert_eq!(beyond.total, 3);

        let _ = cho;
    }

    #[test]
    fn deactivated_aggregates_leave_the_population() {
        let (conn, ana, _ben, _cho) = seeded();
        query::set_active(&conn, ana, MediaType::Series, false, 10).expect("deactivate");

        let hof = hall_of_fame(&conn, SortKey::TotalTime, None, 1, 10, None).expect("rank");
        assert_eq!(hof.total, 2, "ana has no active aggregate left");
        // ben's series time is now the type maximum
        let ben_row = &hof.rows[0];
        assert!((ben_row.types[&MediaType::Series].normalized - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_max_type_scores_zero() {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        let solo = query::create_user(&conn, "solo", 0).expect("create user");
        query::provision(&conn, solo, MediaType::Manga, 0).expect("provision");

        let hof = hall_of_fame(&conn, SortKey::TotalScore, None, 1, 10, None).expect("rank");
        assert_eq!(hof.rows.len(), 1);
        assert!((hof.rows[0].total_score - 0.0).abs() < f64::EPSILON);
        let _ = conn;
    }
}
