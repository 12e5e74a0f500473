//! Command handlers for the `mdy` binary, one module per command family.

pub mod achievements;
pub mod apply;
pub mod completions;
pub mod hof;
pub mod init;
pub mod ledger;
pub mod provision;
pub mod rarity;
pub mod rebuild;
pub mod seed;
pub mod stats;
pub mod top;
pub mod trend;
pub mod user;

use anyhow::Context as _;
use medley_core::db::query;
use rusqlite::Connection;

/// Resolve a user argument: a numeric id, or an exact name looked up in
/// the user table.
pub fn resolve_user(conn: &Connection, raw: &str) -> anyhow::Result<i64> {
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(id);
    }
    let user = query::find_user(conn, raw)
        .with_context(|| format!("look up user '{raw}'"))?
        .with_context(|| format!("no user named '{raw}'; create one with `mdy user add`"))?;
    Ok(user.user_id)
}
