//! `mdy init` — create the statistics database and apply migrations.

use crate::output::{OutputMode, pretty_kv, render};
use anyhow::Result;
use clap::Args;
use medley_core::db::{migrations, open_store};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Arguments for `mdy init`.
#[derive(Args, Debug, Default)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitReport {
    database: String,
    schema_version: u32,
}

/// Execute `mdy init`. Idempotent: re-running against an existing database
/// applies any pending migrations and reports the resulting version.
///
/// # Errors
///
/// Returns an error when the database cannot be created or migrated.
pub fn run_init(_args: &InitArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let conn = open_store(db_path)?;
    let schema_version = migrations::current_schema_version(&conn)?;

    let report = InitReport {
        database: db_path.display().to_string(),
        schema_version,
    };
    render(output, &report, |report, w| {
        writeln!(w, "✓ statistics database ready")?;
        pretty_kv(w, "database", &report.database)?;
        pretty_kv(w, "schema version", report.schema_version.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let db = dir.path().join("stats.db");
        run_init(&InitArgs::default(), OutputMode::Json, &db).expect("first init");
        run_init(&InitArgs::default(), OutputMode::Json, &db).expect("re-init");
        assert!(db.is_file());
    }
}
