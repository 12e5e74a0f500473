//! `mdy achievements` — catalog loading, the batch run, and progress
//! reads.

use crate::cmd::resolve_user;
use crate::joblock::{DEFAULT_LOCK_WAIT, JobLock};
use crate::output::{OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use clap::Args;
use medley_achieve::{batch, catalog, query as achieve_query};
use medley_core::MediaType;
use medley_core::db::{now_us, open_store};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Arguments for `mdy achievements load`.
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// TOML catalog file of achievements and tiers.
    pub file: PathBuf,
}

/// Execute `mdy achievements load`: upsert definitions by code name,
/// replacing each achievement's tier set.
///
/// # Errors
///
/// Returns an error when the catalog cannot be read, fails validation,
/// or the install transaction fails.
pub fn run_load(args: &LoadArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let catalog = catalog::load_file(&args.file)?;
    let mut conn = open_store(db_path)?;
    let report = catalog::install(&mut conn, &catalog)
        .with_context(|| format!("install catalog {}", args.file.display()))?;

    render(output, &report, |report, w| {
        writeln!(w, "✓ catalog installed")?;
        pretty_kv(w, "created", report.created.to_string())?;
        pretty_kv(w, "updated", report.updated.to_string())?;
        pretty_kv(w, "tiers", report.tiers.to_string())
    })
}

/// Arguments for `mdy achievements run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {}

/// Execute `mdy achievements run` under the `achievements` job lock.
///
/// Each achievement is its own unit of work: one failing recipe is
/// reported and the run continues. The command itself succeeds as long
/// as the batch completed; per-achievement failures are in the report.
///
/// # Errors
///
/// Returns an error when another run holds the lock past the wait or the
/// batch cannot start.
pub fn run_batch(_args: &RunArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let _lock = JobLock::acquire(db_path, "achievements", DEFAULT_LOCK_WAIT)?;
    let mut conn = open_store(db_path)?;
    let report = batch::run_all(&mut conn, now_us())?;

    render(output, &report, |report, w| {
        writeln!(w, "✓ achievement batch complete")?;
        pretty_kv(w, "achievements", report.achievements.to_string())?;
        pretty_kv(w, "rows updated", report.rows_updated.to_string())?;
        pretty_kv(w, "rows inserted", report.rows_inserted.to_string())?;
        if !report.failures.is_empty() {
            writeln!(w, "failures:")?;
            for failure in &report.failures {
                writeln!(w, "  {}: {}", failure.code_name, failure.error)?;
            }
        }
        Ok(())
    })
}

/// Arguments for `mdy achievements list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// User id or name.
    pub user: String,

    /// Restrict to one media type.
    #[arg(long)]
    pub media_type: Option<MediaType>,

    /// Show only completed tiers.
    #[arg(long)]
    pub completed: bool,
}

/// Execute `mdy achievements list`: per-tier progress for one user plus
/// the per-difficulty summary.
///
/// # Errors
///
/// Returns an error when the user cannot be resolved or a read fails.
pub fn run_list(args: &ListArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;

    let mut progress = achieve_query::user_progress(&conn, user_id, args.media_type)?;
    if args.completed {
        progress.retain(|row| row.completed);
    }
    let summary = achieve_query::difficulty_summary(&conn, user_id, args.media_type)?;

    let payload = serde_json::json!({
        "progress": progress,
        "summary": summary,
    });
    render(output, &payload, |_, w| {
        for row in &progress {
            let marker = if row.completed { "✓" } else { " " };
            writeln!(
                w,
                "{marker} {:<28} {:<8} {:>4}/{:<6} {:>3}%  rarity {:.2}",
                row.code_name,
                row.difficulty.as_str(),
                row.count,
                row.threshold,
                row.progress,
                row.rarity
            )?;
        }
        if !summary.is_empty() {
            writeln!(w)?;
            for line in &summary {
                writeln!(
                    w,
                    "{:<10} {}/{} completed",
                    line.difficulty.as_str(),
                    line.completed,
                    line.total
                )?;
            }
        }
        Ok(())
    })
}
