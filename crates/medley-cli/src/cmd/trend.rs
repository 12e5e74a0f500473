//! `mdy trend` — bucketed change series reconstructed from snapshots.

use crate::cmd::resolve_user;
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use chrono::{DateTime, Utc};
use medley_core::MediaType;
use medley_core::db::{now_us, open_store};
use medley_core::trend::{self, Granularity};
use std::io::Write;
use std::path::Path;

const DAY_US: i64 = 86_400_000_000;

/// Arguments for `mdy trend`.
#[derive(Args, Debug)]
pub struct TrendArgs {
    /// User id or name.
    pub user: String,

    /// Media type of the series.
    pub media_type: MediaType,

    /// Window length ending now, in days.
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    /// Bucket granularity.
    #[arg(long, default_value = "day")]
    pub granularity: Granularity,
}

/// Execute `mdy trend`.
///
/// Fewer than two snapshots inside/preceding the window yield an empty
/// series, not an error: there is nothing to diff yet.
///
/// # Errors
///
/// Returns an error when the user cannot be resolved or the read fails.
pub fn run_trend(args: &TrendArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;

    let end_us = now_us();
    let start_us = end_us - i64::from(args.days) * DAY_US;
    let points = trend::trend(&conn, user_id, args.media_type, start_us, end_us, args.granularity)?;

    render(output, &points, |points, w| {
        if points.is_empty() {
            writeln!(w, "not enough history for a trend")?;
            return Ok(());
        }
        for point in points {
            let bucket = DateTime::<Utc>::from_timestamp_micros(point.bucket_start_us)
                .map_or_else(|| point.bucket_start_us.to_string(), |dt| {
                    dt.date_naive().to_string()
                });
            writeln!(
                w,
                "{bucket}  entries {:+}  time {:+} min  specific {:+}",
                point.delta.total_entries, point.delta.time_spent_min, point.delta.specific
            )?;
        }
        Ok(())
    })
}
