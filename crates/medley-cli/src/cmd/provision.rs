//! `mdy provision` / `mdy activate` / `mdy deactivate` — aggregate row
//! lifecycle.
//!
//! Aggregate rows are never created lazily: a delta against an
//! unprovisioned (user, media type) is fatal. Provisioning creates the
//! zeroed row; activation toggles ranking visibility without touching
//! history.

use crate::cmd::resolve_user;
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use medley_core::MediaType;
use medley_core::db::{now_us, open_store, query};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy provision`.
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    /// User id or name.
    pub user: String,

    /// Media types to provision; defaults to all six.
    pub media_types: Vec<MediaType>,
}

#[derive(Debug, Serialize)]
struct Provisioned {
    user_id: i64,
    media_types: Vec<MediaType>,
}

/// Execute `mdy provision`. Idempotent per (user, media type).
///
/// # Errors
///
/// Returns an error when the user cannot be resolved or an insert fails.
pub fn run_provision(args: &ProvisionArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;
    let media_types = if args.media_types.is_empty() {
        MediaType::ALL.to_vec()
    } else {
        args.media_types.clone()
    };

    let now = now_us();
    for media_type in &media_types {
        query::provision(&conn, user_id, *media_type, now)?;
    }
    tracing::info!(user_id, count = media_types.len(), "aggregates provisioned");

    let payload = Provisioned {
        user_id,
        media_types,
    };
    render(output, &payload, |payload, w| {
        let names: Vec<&str> = payload.media_types.iter().map(|m| m.as_str()).collect();
        writeln!(
            w,
            "✓ provisioned user {} for {}",
            payload.user_id,
            names.join(", ")
        )
    })
}

/// Arguments for `mdy activate` and `mdy deactivate`.
#[derive(Args, Debug)]
pub struct ActivateArgs {
    /// User id or name.
    pub user: String,

    /// Media type whose aggregate to toggle.
    pub media_type: MediaType,
}

#[derive(Debug, Serialize)]
struct ActiveToggled {
    user_id: i64,
    media_type: MediaType,
    active: bool,
}

/// Execute `mdy activate` / `mdy deactivate`.
///
/// Deactivated aggregates keep accepting deltas and keep their history;
/// they only leave rarity eligibility and the ranked population.
///
/// # Errors
///
/// Returns an error when the user cannot be resolved or no aggregate row
/// exists for the pair.
pub fn run_set_active(
    args: &ActivateArgs,
    active: bool,
    output: OutputMode,
    db_path: &Path,
) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = resolve_user(&conn, &args.user)?;

    let changed = query::set_active(&conn, user_id, args.media_type, active, now_us())?;
    if !changed {
        anyhow::bail!(
            "no {} aggregate for user {user_id}; run `mdy provision` first",
            args.media_type
        );
    }

    let payload = ActiveToggled {
        user_id,
        media_type: args.media_type,
        active,
    };
    render(output, &payload, |payload, w| {
        writeln!(
            w,
            "✓ {} {} for user {}",
            payload.media_type,
            if payload.active { "activated" } else { "deactivated" },
            payload.user_id
        )
    })
}
