//! `mdy events` / `mdy amend` / `mdy forget` — ledger inspection and
//! correction.
//!
//! Corrections touch only the ledger. When a fixed event means historical
//! totals are wrong, follow up with a compensating `mdy apply` or an
//! `mdy rebuild`.

use crate::cmd::resolve_user;
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use medley_core::MediaType;
use medley_core::db::{ledger, open_store};
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy events`.
#[derive(Args, Debug)]
pub struct EventsArgs {
    /// User id or name.
    pub user: String,

    /// Restrict to one media type.
    #[arg(long)]
    pub media_type: Option<MediaType>,

    /// Maximum number of events, newest first.
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}

/// Execute `mdy events`: recent ledger rows, newest first.
///
/// # Errors
///
/// Returns an error when the user cannot be resolved or the read fails.
pub fn run_events(args: &EventsArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;
    let events = ledger::recent_events(&conn, user_id, args.media_type, args.limit)?;

    render(output, &events, |events, w| {
        if events.is_empty() {
            writeln!(w, "no events recorded")?;
            return Ok(());
        }
        writeln!(w, "{:>8}  {:<8} {:>8}  {:>10}  flags", "event", "type", "media", "specific")?;
        for event in events {
            let mut flags = String::new();
            if event.is_completed {
                flags.push_str("completed ");
            }
            if event.is_redo {
                flags.push_str("redo");
            }
            writeln!(
                w,
                "{:>8}  {:<8} {:>8}  {:>10}  {}",
                event.id,
                event.media_type.as_str(),
                event.media_id,
                event.specific_gained,
                flags.trim_end()
            )?;
        }
        Ok(())
    })
}

/// Arguments for `mdy amend`.
#[derive(Args, Debug)]
pub struct AmendArgs {
    /// Ledger event id to amend.
    pub event_id: i64,

    /// New specific-units value (episodes, pages, ...).
    #[arg(long)]
    pub specific: Option<i64>,

    /// New completed flag.
    #[arg(long)]
    pub completed: Option<bool>,

    /// New redo flag.
    #[arg(long)]
    pub redo: Option<bool>,
}

/// Execute `mdy amend`: fix one ledger row in place.
///
/// # Errors
///
/// Returns an error when the event does not exist or the update fails.
pub fn run_amend(args: &AmendArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    if args.specific.is_none() && args.completed.is_none() && args.redo.is_none() {
        anyhow::bail!("nothing to amend; pass --specific, --completed or --redo");
    }

    let conn = open_store(db_path)?;
    let amendment = ledger::EventAmendment {
        specific_gained: args.specific,
        is_completed: args.completed,
        is_redo: args.redo,
    };
    let event = ledger::amend_event(&conn, args.event_id, amendment)?;
    tracing::info!(event_id = event.id, "ledger event amended");

    render(output, &event, |event, w| {
        writeln!(w, "✓ event {} amended", event.id)?;
        writeln!(
            w,
            "  specific={} completed={} redo={}",
            event.specific_gained, event.is_completed, event.is_redo
        )?;
        writeln!(
            w,
            "note: aggregates are untouched; apply a compensating delta or rebuild"
        )
    })
}

/// Arguments for `mdy forget`.
#[derive(Args, Debug)]
pub struct ForgetArgs {
    /// Ledger event id to delete.
    pub event_id: i64,
}

/// Execute `mdy forget`: delete one ledger row (data-entry mistake).
///
/// # Errors
///
/// Returns an error when the event does not exist.
pub fn run_forget(args: &ForgetArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    ledger::forget_event(&conn, args.event_id)?;
    tracing::info!(event_id = args.event_id, "ledger event deleted");

    let payload = serde_json::json!({ "deleted": args.event_id });
    render(output, &payload, |_, w| {
        writeln!(w, "✓ event {} deleted", args.event_id)?;
        writeln!(
            w,
            "note: aggregates are untouched; apply a compensating delta or rebuild"
        )
    })
}
