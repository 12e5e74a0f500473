//! `mdy seed` — fill a database with deterministic demo data.
//!
//! Creates a handful of users, provisions every media type, and replays a
//! randomized history of list entries, tags, and deltas through the real
//! write path, in timestamp order. The PRNG is seeded, so the same
//! `--seed` always produces the same database. Intended for demos and for
//! exercising the read commands on a fresh store.

use crate::output::{OutputMode, pretty_kv, render};
use anyhow::{Context as _, Result};
use clap::Args;
use medley_core::db::{apply, now_us, open_store, query};
use medley_core::{Delta, Dimension, ListEntry, MediaType, Status};
use rand::seq::SliceRandom as _;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::Path;

const DAY_US: i64 = 86_400_000_000;

/// How many days of history the seeded timeline spans.
const HISTORY_DAYS: i64 = 45;

const DEMO_NAMES: &[&str] = &[
    "ada", "bjorn", "chie", "dmitri", "esther", "farid", "greta", "hideo",
];

/// Arguments for `mdy seed`.
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Number of demo users to create.
    #[arg(long, default_value_t = 6)]
    pub users: usize,

    /// List entries per user and media type.
    #[arg(long, default_value_t = 8)]
    pub entries: usize,

    /// PRNG seed; the same seed always produces the same database.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Default, Serialize)]
struct SeedReport {
    users: usize,
    entries: usize,
    tagged_media: usize,
}

fn demo_name(i: usize) -> String {
    DEMO_NAMES
        .get(i)
        .map_or_else(|| format!("demo-{}", i + 1), |name| (*name).to_owned())
}

fn value_pool(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::Genre => &[
            "drama",
            "comedy",
            "thriller",
            "fantasy",
            "sci-fi",
            "slice of life",
        ],
        Dimension::Actor => &[
            "iris vane",
            "marco sol",
            "petra lind",
            "omar reyes",
            "june okafor",
        ],
        Dimension::Director => &["b. linde", "k. aram", "s. okada", "t. moreau"],
        Dimension::Author => &["h. calder", "m. obi", "r. strand", "y. no"],
        Dimension::Studio => &["redbrick", "moonrise", "paper crane", "atelier nord"],
        Dimension::Platform => &["pc", "switch", "ps5", "xbox"],
        Dimension::Developer => &["castle works", "tiny forge", "hexadrive", "north peak"],
        Dimension::Network => &["channel 4", "nbo", "streamline", "antenna"],
    }
}

/// Deterministic tags for a media item, independent of which user's pass
/// inserts them first.
fn media_tags(media_type: MediaType, media_id: i64) -> Vec<(Dimension, &'static str)> {
    let key = usize::try_from(media_id).unwrap_or_default();
    media_type
        .dimensions()
        .iter()
        .enumerate()
        .map(|(slot, &dimension)| {
            let pool = value_pool(dimension);
            (dimension, pool[(key.wrapping_mul(7) + slot) % pool.len()])
        })
        .collect()
}

/// Plausible per-entry scale for each specific unit: (unit range, minutes
/// per unit). A page is minutes; a play-hour is an hour.
fn unit_scale(media_type: MediaType) -> (RangeInclusive<i64>, i64) {
    match media_type {
        MediaType::Series => (1..=48, 42),
        MediaType::Anime => (1..=36, 24),
        MediaType::Movie => (1..=3, 115),
        MediaType::Book => (60..=900, 2),
        MediaType::Game => (2..=120, 60),
        MediaType::Manga => (5..=180, 9),
    }
}

fn random_status(rng: &mut StdRng, media_type: MediaType) -> Status {
    let vocab = media_type.statuses();
    if rng.gen_bool(0.45) {
        Status::Completed
    } else {
        vocab[rng.gen_range(0..vocab.len())]
    }
}

fn random_entry(
    rng: &mut StdRng,
    user_id: i64,
    media_type: MediaType,
    media_id: i64,
) -> ListEntry {
    let mut entry = ListEntry::planned(user_id, media_type, media_id);
    entry.status = random_status(rng, media_type);
    entry.has_comment = rng.gen_bool(0.3);
    if entry.status == Status::Planned {
        return entry;
    }
    let (units, minutes_per_unit) = unit_scale(media_type);
    entry.specific = rng.gen_range(units);
    entry.time_spent_min = entry.specific * minutes_per_unit + rng.gen_range(0..=45);
    if entry.status == Status::Completed || rng.gen_bool(0.5) {
        let rating = f64::from(rng.gen_range(20_u8..=100)) / 10.0;
        entry.is_favorite = rating >= 8.5 && rng.gen_bool(0.6);
        entry.rating = Some(rating);
    }
    if entry.status == Status::Completed && rng.gen_bool(0.2) {
        entry.redo_count = rng.gen_range(1..=3);
    }
    entry
}

/// Seed `users` demo users with `entries` list entries per media type.
///
/// Every entry goes through the real write path: the list row is
/// upserted, the media is tagged, and the entry's contribution is applied
/// as a delta, so the resulting aggregates match a from-scratch rebuild
/// exactly. Deltas are applied in timestamp order, giving each aggregate
/// a snapshot history shaped like real traffic.
fn populate(
    conn: &mut Connection,
    users: usize,
    entries: usize,
    seed: u64,
    now_us: i64,
) -> Result<SeedReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = SeedReport::default();
    let mut tagged: BTreeSet<(MediaType, i64)> = BTreeSet::new();
    // Shared id pool per media type, so users overlap on the same media.
    let ids: Vec<i64> = (1..).take(entries * 3).collect();

    for i in 0..users {
        let name = demo_name(i);
        let user_id = query::create_user(conn, &name, now_us)
            .with_context(|| format!("create demo user '{name}' (already seeded?)"))?;
        report.users += 1;

        let mut timeline = Vec::with_capacity(entries * MediaType::ALL.len());
        for media_type in MediaType::ALL {
            query::provision(conn, user_id, media_type, now_us)?;
            for &media_id in ids.choose_multiple(&mut rng, entries) {
                let at = now_us
                    - rng.gen_range(0..HISTORY_DAYS) * DAY_US
                    - rng.gen_range(0..DAY_US);
                let mut entry = random_entry(&mut rng, user_id, media_type, media_id);
                entry.updated_at_us = at;
                timeline.push((entry, at));
            }
        }

        timeline.sort_by_key(|&(_, at)| at);
        for (entry, at) in timeline {
            query::upsert_entry(conn, &entry)?;
            if tagged.insert((entry.media_type, entry.media_id)) {
                for (dimension, value) in media_tags(entry.media_type, entry.media_id) {
                    query::tag_media(conn, entry.media_type, entry.media_id, dimension, value)?;
                }
                report.tagged_media += 1;
            }
            let delta = Delta::between(None, Some(&entry));
            apply::apply_delta(conn, user_id, entry.media_type, entry.media_id, &delta, at)?;
            report.entries += 1;
        }
    }
    Ok(report)
}

/// Execute `mdy seed`.
///
/// # Errors
///
/// Returns an error when the store cannot be opened or a demo user
/// already exists (seeding expects a fresh database).
pub fn run_seed(args: &SeedArgs, output: OutputMode, db_path: &Path) -> Result<()> {
    let mut conn = open_store(db_path)?;
    let report = populate(&mut conn, args.users, args.entries, args.seed, now_us())?;
    tracing::info!(
        users = report.users,
        entries = report.entries,
        seed = args.seed,
        "demo data seeded"
    );
    render(output, &report, |report, w| {
        writeln!(w, "✓ demo data seeded")?;
        pretty_kv(w, "users", report.users.to_string())?;
        pretty_kv(w, "entries", report.entries.to_string())?;
        pretty_kv(w, "tagged media", report.tagged_media.to_string())?;
        writeln!(w, "try `mdy hof` or `mdy stats {}`", demo_name(0))
    })
}
