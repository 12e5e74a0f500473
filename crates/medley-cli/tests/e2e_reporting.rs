//! E2E reporting tests: seeded stores, trends, rankings, achievements.
//!
//! Each test runs `mdy` as a subprocess against an isolated temp database,
//! seeded through the real write path so every read surface has material.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the mdy binary and `db`.
fn mdy_cmd(db: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdy"));
    cmd.arg("--db").arg(db);
    // Suppress tracing output that goes to stderr
    cmd.env("MEDLEY_LOG", "error");
    cmd
}

/// Seed a fresh store and return the parsed seed report.
fn seed(db: &Path, users: &str, entries: &str, seed: &str) -> Value {
    mdy_cmd(db).arg("init").assert().success();
    let output = mdy_cmd(db)
        .args([
            "seed", "--users", users, "--entries", entries, "--seed", seed, "--json",
        ])
        .output()
        .expect("seed should not crash");
    assert!(
        output.status.success(),
        "seed failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("seed --json should produce valid JSON")
}

/// Run any read command with `--json` and return the parsed document.
fn read_json(db: &Path, args: &[&str]) -> Value {
    let mut full_args = args.to_vec();
    full_args.push("--json");
    let output = mdy_cmd(db)
        .args(&full_args)
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Write a small achievement catalog and return its path.
fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("catalog.toml");
    std::fs::write(
        &path,
        r#"
[[achievement]]
code_name = "series_starter"
name = "Starter"
description = "Finish series."
media_type = "series"
kind = "count"

[achievement.tiers]
bronze = 1
silver = 5
gold = 200

[[achievement]]
code_name = "genre_tourist"
name = "Genre Tourist"
description = "Finish series across distinct genres."
media_type = "series"
kind = "distinct_count"
dimension = "genre"

[achievement.tiers]
bronze = 2
gold = 50

[[achievement]]
code_name = "marathon"
name = "Marathon"
description = "Hours spent on anime."
media_type = "anime"
kind = "time_sum"

[achievement.tiers]
bronze = 1
diamond = 100000
"#,
    )
    .expect("write catalog");
    path
}

// ===========================================================================
// Test 1: Seeding
// ===========================================================================

#[test]
fn seed_reports_what_it_wrote() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");

    let report = seed(&db, "4", "10", "7");
    assert_eq!(report["users"], 4);
    assert_eq!(report["entries"], 4 * 6 * 10);
    assert!(report["tagged_media"].as_u64().unwrap() > 0);

    // Demo users come from the fixed name pool.
    let aggregates = read_json(&db, &["stats", "ada"]);
    assert_eq!(aggregates.as_array().expect("array").len(), 6);
}

#[test]
fn seeding_twice_fails_loudly() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");

    seed(&db, "2", "4", "1");
    mdy_cmd(&db)
        .args(["seed", "--users", "2", "--entries", "4", "--seed", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already seeded"));
}

// ===========================================================================
// Test 2: Trends and affinity
// ===========================================================================

#[test]
fn trend_buckets_the_seeded_history() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "3", "10", "7");

    let points = read_json(&db, &["trend", "ada", "series", "--days", "60"]);
    let points = points.as_array().expect("array");
    assert!(points.len() >= 2, "45 days of history spans buckets");
    for pair in points.windows(2) {
        assert!(
            pair[0]["bucket_start_us"].as_i64() < pair[1]["bucket_start_us"].as_i64(),
            "buckets are chronological"
        );
    }

    // Weekly rollups cover the same window with fewer, coarser buckets.
    let weekly = read_json(&db, &["trend", "ada", "series", "--days", "60", "--granularity", "week"]);
    assert!(weekly.as_array().expect("array").len() <= points.len());
}

#[test]
fn trend_without_history_is_empty_not_an_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    mdy_cmd(&db).arg("init").assert().success();
    mdy_cmd(&db).args(["user", "add", "mika"]).assert().success();
    mdy_cmd(&db).args(["provision", "mika"]).assert().success();

    let points = read_json(&db, &["trend", "mika", "series"]);
    assert_eq!(points, serde_json::json!([]));
}

#[test]
fn top_ranks_tag_values_within_bounds() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "4", "12", "7");

    let rows = read_json(&db, &["top", "series", "genre"]);
    let rows = rows.as_array().expect("array");
    assert!(!rows.is_empty(), "48 tagged entries over 6 genres must rank");
    assert!(rows.len() <= 10);
    for pair in rows.windows(2) {
        assert!(
            pair[0]["affinity"].as_f64() >= pair[1]["affinity"].as_f64(),
            "descending affinity"
        );
    }
    for row in rows {
        let affinity = row["affinity"].as_f64().expect("affinity");
        assert!((0.0..10.0).contains(&affinity));
        assert!(row["entries"].as_i64().expect("entries") >= 3);
    }

    // Per-user scope parses and runs; small samples may rank nothing.
    read_json(&db, &["top", "series", "genre", "--user", "ada"]);
}

#[test]
fn top_rejects_a_foreign_dimension() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "2", "4", "1");

    mdy_cmd(&db)
        .args(["top", "book", "platform"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist for media type"));
}

// ===========================================================================
// Test 3: Hall of fame
// ===========================================================================

#[test]
fn hof_ranks_the_whole_population() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "4", "10", "7");

    let page = read_json(&db, &["hof"]);
    assert_eq!(page["total"], 4);
    let rows = page["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["rank"], 1);
    for pair in rows.windows(2) {
        assert!(
            pair[0]["total_score"].as_f64() >= pair[1]["total_score"].as_f64(),
            "descending score"
        );
    }

    let by_time = read_json(&db, &["hof", "--sort", "time"]);
    let rows = by_time["rows"].as_array().expect("rows");
    for pair in rows.windows(2) {
        assert!(
            pair[0]["total_time_min"].as_i64() >= pair[1]["total_time_min"].as_i64(),
            "descending raw time"
        );
    }
}

#[test]
fn hof_search_filters_rows_but_not_ranks() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "4", "10", "7");

    let page = read_json(&db, &["hof", "--search", "bj", "--me", "chie"]);
    let rows = page["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1, "only bjorn matches 'bj'");
    assert_eq!(rows[0]["name"], "bjorn");
    let rank = rows[0]["rank"].as_u64().expect("rank");
    assert!((1..=4).contains(&rank), "rank is population-wide");

    // The requester's standing is reported even though the search hides her.
    assert_eq!(page["requester"]["name"], "chie");
}

#[test]
fn deactivated_users_leave_the_boards() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "3", "8", "3");

    for media_type in ["series", "anime", "movie", "book", "game", "manga"] {
        mdy_cmd(&db)
            .args(["deactivate", "ada", media_type])
            .assert()
            .success();
    }

    let page = read_json(&db, &["hof"]);
    assert_eq!(page["total"], 2);
    for row in page["rows"].as_array().expect("rows") {
        assert_ne!(row["name"], "ada");
    }
}

// ===========================================================================
// Test 4: Achievements
// ===========================================================================

#[test]
fn achievement_catalog_loads_runs_and_lists() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "4", "10", "7");
    let catalog = write_catalog(dir.path());

    let install = read_json(&db, &["achievements", "load", catalog.to_str().unwrap()]);
    assert_eq!(install["created"], 3);
    assert_eq!(install["updated"], 0);
    assert_eq!(install["tiers"], 7);

    let run = read_json(&db, &["achievements", "run"]);
    assert_eq!(run["achievements"], 3);
    assert_eq!(run["failures"], serde_json::json!([]));
    assert!(run["rows_inserted"].as_u64().unwrap() > 0);

    let listing = read_json(&db, &["achievements", "list", "ada"]);
    let progress = listing["progress"].as_array().expect("progress");
    assert!(!progress.is_empty());
    for row in progress {
        let count = row["count"].as_i64().expect("count");
        let threshold = row["threshold"].as_i64().expect("threshold");
        let completed = row["completed"].as_bool().expect("completed");
        assert_eq!(completed, count >= threshold);
    }
    assert!(!listing["summary"].as_array().expect("summary").is_empty());
}

#[test]
fn achievement_batch_rerun_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "3", "10", "7");
    let catalog = write_catalog(dir.path());
    read_json(&db, &["achievements", "load", catalog.to_str().unwrap()]);

    read_json(&db, &["achievements", "run"]);
    let rerun = read_json(&db, &["achievements", "run"]);
    assert_eq!(rerun["rows_updated"], 0, "unchanged store, no writes");
    assert_eq!(rerun["rows_inserted"], 0);
}

#[test]
fn reloading_a_catalog_updates_instead_of_duplicating() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "2", "4", "1");
    let catalog = write_catalog(dir.path());

    read_json(&db, &["achievements", "load", catalog.to_str().unwrap()]);
    let second = read_json(&db, &["achievements", "load", catalog.to_str().unwrap()]);
    assert_eq!(second["created"], 0);
    assert_eq!(second["updated"], 3);
}

#[test]
fn rarity_covers_every_tier() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "3", "10", "7");
    let catalog = write_catalog(dir.path());
    read_json(&db, &["achievements", "load", catalog.to_str().unwrap()]);
    read_json(&db, &["achievements", "run"]);

    let report = read_json(&db, &["rarity"]);
    assert_eq!(report["tiers"], 7);

    let listing = read_json(&db, &["achievements", "list", "ada"]);
    for row in listing["progress"].as_array().expect("progress") {
        let rarity = row["rarity"].as_f64().expect("rarity");
        assert!((0.0..=1.0).contains(&rarity));
    }
}

// ===========================================================================
// Test 5: Rebuild
// ===========================================================================

#[test]
fn rebuild_after_seeding_finds_no_drift() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "2", "6", "5");

    let report = read_json(&db, &["rebuild"]);
    assert_eq!(report["pairs"], 12);
    assert_eq!(report["entries"], 2 * 6 * 6);
    assert_eq!(report["drifted"], 0);
}

#[test]
fn rebuild_realigns_an_aggregate_with_its_entries() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("medley.db");
    seed(&db, "2", "6", "5");

    let before = read_json(&db, &["stats", "ada", "--media-type", "series"]);
    let time_before = before[0]["time_spent_min"].as_i64().expect("time");

    // A delta with no backing list entry drifts the aggregate.
    mdy_cmd(&db)
        .args(["apply", "ada", "series", "--json"])
        .write_stdin(r#"{"time_spent_min": 30}"#)
        .assert()
        .success();

    let report = read_json(&db, &["rebuild", "--user", "ada"]);
    assert_eq!(report["drifted"], 1);

    let after = read_json(&db, &["stats", "ada", "--media-type", "series"]);
    assert_eq!(after[0]["time_spent_min"].as_i64().expect("time"), time_before);
}
