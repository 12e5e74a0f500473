//! `mdy hof` — the cross-media-type hall of fame.

use crate::cmd::resolve_user;
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use medley_core::db::open_store;
use medley_rank::hall_of_fame::{self, HofRow, SortKey};
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy hof`.
#[derive(Args, Debug)]
pub struct HofArgs {
    /// Ordering: `score`, `time`, or a media type name.
    #[arg(long, default_value = "score")]
    pub sort: SortKey,

    /// Case-insensitive name filter (ranks stay population-wide).
    #[arg(long)]
    pub search: Option<String>,

    /// 1-based page.
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page.
    #[arg(long, default_value_t = 20)]
    pub per_page: usize,

    /// Also report this user's own standing (id or name).
    #[arg(long)]
    pub me: Option<String>,
}

/// Execute `mdy hof`.
///
/// # Errors
///
/// Returns an error when the requester cannot be resolved or the read
/// fails.
pub fn run_hof(args: &HofArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let requester = match &args.me {
        Some(raw) => Some(resolve_user(&conn, raw)?),
        None => None,
    };

    let page = hall_of_fame::hall_of_fame(
        &conn,
        args.sort,
        args.search.as_deref(),
        args.page,
        args.per_page,
        requester,
    )?;

    render(output, &page, |page, w| {
        writeln!(
            w,
            "hall of fame by {} — page {} of {} ranked",
            args.sort, page.page, page.total
        )?;
        for row in &page.rows {
            render_row_human(row, w)?;
        }
        if let Some(requester) = &page.requester {
            writeln!(w, "you:")?;
            render_row_human(requester, w)?;
        }
        Ok(())
    })
}

fn render_row_human(row: &HofRow, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{:>4}. {:<20} score {:.3}  time {} min",
        row.rank, row.name, row.total_score, row.total_time_min
    )
}
