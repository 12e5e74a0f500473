//! `mdy apply` — apply one delta document to a (user, media type)
//! aggregate.
//!
//! The delta arrives as a sparse JSON document (fields default to zero),
//! the interchange format produced by the list-management collaborator:
//!
//! ```json
//! {"total_entries": 1, "time_spent_min": 90, "status_counts": {"completed": 1}}
//! ```

use crate::cmd::resolve_user;
use crate::output::{OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use clap::Args;
use medley_core::db::{apply, now_us, open_store};
use medley_core::{Delta, MediaAggregate, MediaType};
use serde::Serialize;
use std::io::{Read as _, Write};
use std::path::{Path, PathBuf};

/// Arguments for `mdy apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// User id or name.
    pub user: String,

    /// Media type of the aggregate.
    pub media_type: MediaType,

    /// List entry id recorded on the ledger event.
    #[arg(long, default_value_t = 0)]
    pub media_id: i64,

    /// Read the delta JSON from this file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Applied<'a> {
    event_id: i64,
    snapshot_id: i64,
    aggregate: &'a MediaAggregate,
}

fn read_delta(file: Option<&Path>) -> Result<Delta> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read delta file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read delta from stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("parse delta JSON")
}

/// Execute `mdy apply`.
///
/// All-or-nothing: on a constraint violation nothing is written — no
/// aggregate change, no ledger event, no snapshot — and the violation is
/// reported as the process error.
///
/// # Errors
///
/// Returns an error when the delta cannot be read or parsed, the
/// aggregate row is missing, or folding the delta violates an invariant.
pub fn run_apply(args: &ApplyArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let delta = read_delta(args.file.as_deref())?;
    let mut conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;

    let outcome = apply::apply_delta(
        &mut conn,
        user_id,
        args.media_type,
        args.media_id,
        &delta,
        now_us(),
    )?;
    tracing::info!(
        user_id,
        media_type = %args.media_type,
        event_id = outcome.event_id,
        "delta applied"
    );

    let payload = Applied {
        event_id: outcome.event_id,
        snapshot_id: outcome.snapshot_id,
        aggregate: &outcome.aggregate,
    };
    render(output, &payload, |payload, w| {
        writeln!(w, "✓ delta applied")?;
        pretty_kv(w, "event", payload.event_id.to_string())?;
        pretty_kv(w, "snapshot", payload.snapshot_id.to_string())?;
        pretty_kv(
            w,
            "entries",
            payload.aggregate.total_entries.to_string(),
        )?;
        pretty_kv(
            w,
            "time spent (min)",
            payload.aggregate.time_spent_min.to_string(),
        )
    })
}
