//! `mdy user` — user management.

use crate::output::{OutputMode, pretty_kv, render};
use anyhow::Result;
use clap::Args;
use medley_core::db::{now_us, open_store, query};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy user add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Display name. Used by hall-of-fame name search.
    pub name: String,
}

#[derive(Debug, Serialize)]
struct AddedUser {
    user_id: i64,
    name: String,
}

/// Execute `mdy user add`.
///
/// # Errors
///
/// Returns an error when the name is blank or already taken.
pub fn run_add(args: &AddArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let user_id = query::create_user(&conn, &args.name, now_us())?;
    tracing::info!(user_id, name = %args.name, "user created");

    let payload = AddedUser {
        user_id,
        name: args.name.clone(),
    };
    render(output, &payload, |payload, w| {
        writeln!(w, "✓ user created")?;
        pretty_kv(w, "id", payload.user_id.to_string())?;
        pretty_kv(w, "name", &payload.name)
    })
}
