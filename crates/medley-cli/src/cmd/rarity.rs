//! `mdy rarity` — recompute tier rarity across the population.

use crate::joblock::{DEFAULT_LOCK_WAIT, JobLock};
use crate::output::{OutputMode, pretty_kv, render};
use anyhow::Result;
use clap::Args;
use medley_achieve::rarity;
use medley_core::db::{now_us, open_store};
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy rarity`.
#[derive(Args, Debug, Default)]
pub struct RarityArgs {}

/// Execute `mdy rarity` under the `rarity` job lock.
///
/// # Errors
///
/// Returns an error when another rarity run holds the lock past the wait
/// or the recompute fails.
pub fn run_rarity(_args: &RarityArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let _lock = JobLock::acquire(db_path, "rarity", DEFAULT_LOCK_WAIT)?;
    let mut conn = open_store(db_path)?;
    let report = rarity::recompute(&mut conn, now_us())?;

    render(output, &report, |report, w| {
        writeln!(w, "✓ rarity recomputed")?;
        pretty_kv(w, "tiers", report.tiers.to_string())
    })
}
