//! `mdy stats` — current aggregate state for one user.

use crate::cmd::resolve_user;
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use medley_core::db::{open_store, query};
use medley_core::{MediaAggregate, MediaType};
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// User id or name.
    pub user: String,

    /// Restrict to one media type.
    #[arg(long)]
    pub media_type: Option<MediaType>,
}

/// Execute `mdy stats`.
///
/// # Errors
///
/// Returns an error when the user cannot be resolved, the requested
/// media type was never provisioned, or a read fails.
pub fn run_stats(args: &StatsArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;

    let aggregates: Vec<MediaAggregate> = match args.media_type {
        Some(media_type) => {
            vec![query::require_aggregate(&conn, user_id, media_type)?]
        }
        None => query::list_user_aggregates(&conn, user_id)?,
    };

    render(output, &aggregates, |aggregates, w| {
        if aggregates.is_empty() {
            writeln!(w, "no aggregates provisioned")?;
            return Ok(());
        }
        for agg in aggregates {
            render_aggregate_human(agg, w)?;
        }
        Ok(())
    })
}

fn render_aggregate_human(agg: &MediaAggregate, w: &mut dyn Write) -> std::io::Result<()> {
    let average = agg
        .average_rating()
        .map_or_else(|| "-".to_string(), |avg| format!("{avg:.2}"));
    writeln!(
        w,
        "{} [{}]",
        agg.media_type,
        if agg.active { "active" } else { "inactive" }
    )?;
    writeln!(
        w,
        "  entries {}  time {} min  {} {}  redo {}",
        agg.total_entries,
        agg.time_spent_min,
        agg.media_type.specific_unit(),
        agg.total_specific,
        agg.total_redo
    )?;
    writeln!(
        w,
        "  rated {} (avg {})  favorites {}  commented {}",
        agg.entries_rated, average, agg.entries_favorites, agg.entries_commented
    )?;
    let statuses: Vec<String> = agg
        .status_counts
        .iter()
        .map(|(status, count)| format!("{status}={count}"))
        .collect();
    writeln!(w, "  {}", statuses.join("  "))
}
