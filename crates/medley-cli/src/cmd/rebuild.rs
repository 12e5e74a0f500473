//! `mdy rebuild` — recompute aggregates from raw list entries.

use crate::joblock::{DEFAULT_LOCK_WAIT, JobLock};
use crate::output::{OutputMode, pretty_kv, render};
use anyhow::Result;
use clap::Args;
use medley_core::db::{now_us, open_store, rebuild};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy rebuild`.
#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Rebuild only this user (id or name); defaults to every user.
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
struct RebuildPayload {
    pairs: usize,
    entries: usize,
    drifted: usize,
}

/// Execute `mdy rebuild` under the `rebuild` job lock.
///
/// Recovery path for bulk imports and ledger corrections: every counter
/// is rederived from list entries; `active` flags and history are
/// preserved, and no events or snapshots are written.
///
/// # Errors
///
/// Returns an error when another rebuild holds the lock past the wait,
/// or when the recompute fails.
pub fn run_rebuild(args: &RebuildArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let _lock = JobLock::acquire(db_path, "rebuild", DEFAULT_LOCK_WAIT)?;
    let mut conn = open_store(db_path)?;

    let report = match &args.user {
        Some(raw) => {
            let user_id = crate::cmd::resolve_user(&conn, raw)?;
            rebuild::rebuild_user(&mut conn, user_id, now_us())?
        }
        None => rebuild::rebuild_all(&mut conn, now_us())?,
    };

    let payload = RebuildPayload {
        pairs: report.pairs,
        entries: report.entries,
        drifted: report.drifted,
    };
    render(output, &payload, |payload, w| {
        writeln!(w, "✓ rebuild complete")?;
        pretty_kv(w, "aggregates", payload.pairs.to_string())?;
        pretty_kv(w, "entries folded", payload.entries.to_string())?;
        pretty_kv(w, "drift corrected", payload.drifted.to_string())
    })
}
