//! Trend reconstruction over history snapshots.
//!
//! A trend series is rebuilt from snapshots, never from the ledger: take
//! the ordered snapshot sequence, compute the delta between each pair of
//! consecutive snapshots, and sum those deltas into calendar buckets. The
//! latest snapshot strictly before the window seeds the sequence so a
//! window that starts mid-series still produces a delta for its first
//! in-range snapshot.

use crate::db::query;
use crate::error::{Result, StatsError};
use crate::media::MediaType;
use crate::model::{Delta, StatsSnapshot};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---- Granularity ----

/// Calendar bucket width for a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

/// Error returned when parsing an unknown granularity string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGranularity {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown granularity '{}' (expected day, week or month)",
            self.raw
        )
    }
}

impl std::error::Error for UnknownGranularity {}

impl Granularity {
    /// Every granularity, ordered finest first.
    pub const ALL: [Self; 3] = [Self::Day, Self::Week, Self::Month];

    /// Canonical lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = UnknownGranularity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(UnknownGranularity { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the lowercase string.
impl Serialize for Granularity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Granularity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ---- Series reconstruction ----

/// One bucket of a trend series: the summed change inside the bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Microsecond UTC timestamp of the bucket's calendar start.
    pub bucket_start_us: i64,
    /// Net change across the bucket.
    pub delta: Delta,
}

fn bucket_date(granularity: Granularity, date: NaiveDate) -> Option<NaiveDate> {
    match granularity {
        Granularity::Day => Some(date),
        Granularity::Week => {
            date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        }
        Granularity::Month => date.with_day(1),
    }
}

fn bucket_start_us(granularity: Granularity, at_us: i64) -> Option<i64> {
    let date = DateTime::<Utc>::from_timestamp_micros(at_us)?.date_naive();
    let start = bucket_date(granularity, date)?;
    Some(start.and_time(NaiveTime::MIN).and_utc().timestamp_micros())
}

/// Sum pairwise snapshot deltas into calendar buckets.
///
/// `snapshots` must be ordered oldest-first, the order `range_of` returns.
/// Fewer than two snapshots yield an empty series. Each delta lands in the
/// bucket of the *later* snapshot, the moment the change became visible.
///
/// # Errors
///
/// Returns [`StatsError::Corrupt`] when a snapshot timestamp falls outside
/// the representable calendar range.
pub fn bucket_deltas(
    snapshots: &[StatsSnapshot],
    granularity: Granularity,
) -> Result<Vec<TrendPoint>> {
    let mut buckets: BTreeMap<i64, Delta> = BTreeMap::new();
    for pair in snapshots.windows(2) {
        let at_us = pair[1].recorded_at_us;
        let key = bucket_start_us(granularity, at_us).ok_or_else(|| StatsError::Corrupt {
            table: "stats_history",
            detail: format!("recorded_at_us {at_us} is outside the calendar range"),
        })?;
        buckets.entry(key).or_default().merge(&pair[1].delta_since(&pair[0]));
    }
    Ok(buckets
        .into_iter()
        .map(|(bucket_start_us, delta)| TrendPoint {
            bucket_start_us,
            delta,
        })
        .collect())
}

/// Trend series for (user, media type) over `[start_us, end_us]`.
///
/// # Errors
///
/// Returns a storage error if the snapshot reads fail, or
/// [`StatsError::Corrupt`] for an out-of-range snapshot timestamp.
pub fn trend(
    conn: &Connection,
    user_id: i64,
    media_type: MediaType,
    start_us: i64,
    end_us: i64,
    granularity: Granularity,
) -> Result<Vec<TrendPoint>> {
    let mut snapshots = Vec::new();
    if let Some(baseline) = query::last_before(conn, user_id, media_type, start_us)? {
        snapshots.push(baseline);
    }
    snapshots.extend(query::range_of(conn, user_id, media_type, start_us, end_us)?);

    let points = bucket_deltas(&snapshots, granularity)?;
    tracing::debug!(
        user_id,
        media_type = %media_type,
        granularity = %granularity,
        snapshots = snapshots.len(),
        buckets = points.len(),
        "trend reconstructed"
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{apply, migrations};
    use crate::media::Status;

    const DAY_US: i64 = 86_400 * 1_000_000;

    fn snap(recorded_at_us: i64, total: i64, specific: i64, completed: i64) -> StatsSnapshot {
        StatsSnapshot {
            user_id: 1,
            media_type: MediaType::Anime,
            recorded_at_us,
            time_spent_min: specific * 20,
            total_entries: total,
            total_redo: 0,
            entries_rated: 0,
            sum_entries_rated: 0.0,
            entries_commented: 0,
            entries_favorites: 0,
            total_specific: specific,
            status_counts: BTreeMap::from([(Status::Completed, completed)]),
        }
    }

    #[test]
    fn granularity_labels_roundtrip() {
        for g in Granularity::ALL {
            assert_eq!(g.as_str().parse::<Granularity>().expect("parse"), g);
        }
        let err = "fortnight".parse::<Granularity>().unwrap_err();
        assert!(err.to_string().contains("fortnight"));
    }

    #[test]
    fn fewer_than_two_snapshots_is_an_empty_series() {
        assert!(bucket_deltas(&[], Granularity::Day).expect("bucket").is_empty());
        assert!(
            bucket_deltas(&[snap(DAY_US, 5, 50, 2)], Granularity::Day)
                .expect("bucket")
                .is_empty()
        );
    }

    #[test]
    fn deltas_land_in_the_later_snapshots_bucket_and_sum() {
        // two changes on day 2, one on day 3
        let snapshots = [
            snap(DAY_US, 10, 100, 4),
            snap(2 * DAY_US + 1_000, 11, 112, 5),
            snap(2 * DAY_US + 2_000, 11, 120, 5),
            snap(3 * DAY_US, 12, 124, 6),
        ];
        let points = bucket_deltas(&snapshots, Granularity::Day).expect("bucket");
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].bucket_start_us, 2 * DAY_US);
        assert_eq!(points[0].delta.total_entries, 1);
        assert_eq!(points[0].delta.specific, 20);
        assert_eq!(points[0].delta.status_counts[&Status::Completed], 1);

        assert_eq!(points[1].bucket_start_us, 3 * DAY_US);
        assert_eq!(points[1].delta.specific, 4);
    }

    #[test]
    fn bucket_sums_telescope_to_the_window_totals() {
        // whatever the granularity, summing all buckets equals last - first
        let snapshots = [
            snap(DAY_US, 3, 30, 1),
            snap(5 * DAY_US, 7, 95, 3),
            snap(9 * DAY_US, 8, 110, 3),
            snap(40 * DAY_US, 20, 400, 11),
        ];
        for granularity in Granularity::ALL {
            let points = bucket_deltas(&snapshots, granularity).expect("bucket");
            let mut sum = Delta::default();
            for point in &points {
                sum.merge(&point.delta);
            }
            let expected = snapshots[3].delta_since(&snapshots[0]);
            assert_eq!(sum, expected, "granularity {granularity}");
        }
    }

    #[test]
    fn week_buckets_start_on_monday() {
        // 1970-01-01 was a Thursday; its week bucket starts Monday 1969-12-29
        let monday_us = bucket_start_us(Granularity::Week, 0).expect("in range");
        assert_eq!(monday_us, -3 * DAY_US);
    }

    #[test]
    fn storage_trend_uses_the_pre_window_baseline() {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        let user = query::create_user(&conn, "omar", 0).expect("create user");
        query::provision(&conn, user, MediaType::Game, 0).expect("provision");

        for (at, hours) in [(DAY_US, 2_i64), (10 * DAY_US, 3), (10 * DAY_US + 500, 1)] {
            let delta = Delta {
                specific: hours,
                time_spent_min: hours * 60,
                ..Delta::default()
            };
            apply::apply_delta(&mut conn, user, MediaType::Game, 7, &delta, at)
                .expect("apply");
        }

        // window starts after the first snapshot, which becomes the baseline
        let points = trend(
            &conn,
            user,
            MediaType::Game,
            5 * DAY_US,
            11 * DAY_US,
            Granularity::Day,
        )
        .expect("trend");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].bucket_start_us, 10 * DAY_US);
        assert_eq!(points[0].delta.specific, 4);
        assert_eq!(points[0].delta.time_spent_min, 240);

        // no baseline and a single in-range snapshot: nothing representable
        let early = trend(
            &conn,
            user,
            MediaType::Game,
            0,
            2 * DAY_US,
            Granularity::Day,
        )
        .expect("trend");
        assert!(early.is_empty());
    }
}
