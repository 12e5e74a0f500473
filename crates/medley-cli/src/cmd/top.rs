//! `mdy top` — affinity ranking for one (media type, dimension).

use crate::cmd::resolve_user;
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use medley_core::db::open_store;
use medley_core::{Dimension, MediaType};
use medley_rank::affinity;
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy top`.
#[derive(Args, Debug)]
pub struct TopArgs {
    /// Media type to rank within.
    pub media_type: MediaType,

    /// Tag dimension to group by (genre, actor, studio, ...).
    pub dimension: Dimension,

    /// Rank one user's list; defaults to the whole population.
    #[arg(long)]
    pub user: Option<String>,
}

/// Execute `mdy top`.
///
/// # Errors
///
/// Returns an error when the dimension does not exist for the media type
/// or the read fails.
pub fn run_top(args: &TopArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = match &args.user {
        Some(raw) => Some(resolve_user(&conn, raw)?),
        None => None,
    };

    let rows = affinity::top_values(&conn, args.media_type, args.dimension, user_id)?;

    render(output, &rows, |rows, w| {
        if rows.is_empty() {
            writeln!(w, "no group with enough entries")?;
            return Ok(());
        }
        for (index, row) in rows.iter().enumerate() {
            writeln!(
                w,
                "{:>2}. {:<24} affinity {:.2}  entries {}  avg {:.1}  favorites {}",
                index + 1,
                row.value,
                row.affinity,
                row.entries,
                row.avg_rating,
                row.favorites
            )?;
        }
        Ok(())
    })
}
