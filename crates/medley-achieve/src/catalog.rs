//! The achievement catalog: admin-edited TOML definitions and their
//! storage in the `achievements` / `achievement_tiers` tables.
//!
//! Loading upserts achievements by `code_name` and *replaces* their tiers.
//! Tier replacement cascades away any existing progress rows for that
//! achievement; the next batch run recomputes them from current list data.
//!
//! ```toml
//! [[achievement]]
//! code_name = "series_completionist"
//! name = "Completionist"
//! description = "Finish series."
//! media_type = "series"
//! kind = "count"
//!
//! [achievement.tiers]
//! bronze = 5
//! silver = 25
//! gold = 100
//! ```

use crate::recipe::{AchievementDef, Difficulty, MetricKind};
use anyhow::{Context, Result, bail};
use medley_core::error::{Result as StoreResult, StatsError};
use medley_core::media::{Dimension, MediaType};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ---- TOML model ----

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "achievement")]
    pub achievements: Vec<CatalogAchievement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogAchievement {
    pub code_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub media_type: MediaType,
    pub kind: MetricKind,
    #[serde(default)]
    pub dimension: Option<Dimension>,
    #[serde(default)]
    pub value: Option<String>,
    pub tiers: BTreeMap<Difficulty, i64>,
}

/// Parse and validate a catalog document.
///
/// # Errors
///
/// Fails on TOML syntax errors and on definitions the engine could not
/// run: unknown kinds never get this far (typed fields), but missing or
/// foreign dimensions, missing values, duplicate code names, and
/// non-positive thresholds are rejected here.
pub fn parse(text: &str) -> Result<Catalog> {
    let catalog: Catalog = toml::from_str(text).context("Failed to parse achievement catalog")?;
    validate(&catalog)?;
    Ok(catalog)
}

/// Load and validate a catalog file.
///
/// # Errors
///
/// As [`parse`], plus file read failures.
pub fn load_file(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn validate(catalog: &Catalog) -> Result<()> {
    let mut seen = BTreeSet::new();
    for def in &catalog.achievements {
        let code = def.code_name.as_str();
        if code.trim().is_empty() {
            bail!("achievement with empty code_name");
        }
        if !seen.insert(code) {
            bail!("duplicate achievement code_name '{code}'");
        }
        if def.tiers.is_empty() {
            bail!("achievement '{code}' defines no tiers");
        }
        for (difficulty, threshold) in &def.tiers {
            if *threshold <= 0 {
                bail!("achievement '{code}' tier {difficulty} has non-positive threshold");
            }
        }
        match def.dimension {
            Some(dimension) if !def.media_type.supports_dimension(dimension) => {
                bail!(
                    "achievement '{code}': media type {} has no dimension {dimension}",
                    def.media_type
                );
            }
            Some(_) => {}
            None if def.kind.needs_dimension() => {
                bail!("achievement '{code}': kind {} needs a dimension", def.kind);
            }
            None => {}
        }
        if def.kind.needs_value() && def.value.is_none() {
            bail!(
                "achievement '{code}': kind {} needs a dimension value",
                def.kind
            );
        }
    }
    Ok(())
}

// ---- Storage ----

/// What an install pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub created: usize,
    pub updated: usize,
    pub tiers: usize,
}

/// Upsert a validated catalog into the store, one transaction.
///
/// # Errors
///
/// Returns a storage error if any statement fails; nothing is partially
/// installed.
pub fn install(conn: &mut Connection, catalog: &Catalog) -> StoreResult<InstallReport> {
    let tx = conn.transaction()?;
    let mut report = InstallReport::default();

    for def in &catalog.achievements {
        let existing: Option<i64> = match tx.query_row(
            "SELECT achievement_id FROM achievements WHERE code_name = ?1",
            params![def.code_name],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        tx.execute(
            "INSERT INTO achievements
                (code_name, name, description, media_type, kind, dimension, value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (code_name) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                media_type = excluded.media_type,
                kind = excluded.kind,
                dimension = excluded.dimension,
                value = excluded.value",
            params![
                def.code_name,
                def.name,
                def.description,
                def.media_type.as_str(),
                def.kind.as_str(),
                def.dimension.map(|d| d.as_str()),
                def.value,
            ],
        )?;
        let achievement_id: i64 = tx.query_row(
            "SELECT achievement_id FROM achievements WHERE code_name = ?1",
            params![def.code_name],
            |row| row.get(0),
        )?;

        // replacing tiers cascades away stale progress rows
        tx.execute(
            "DELETE FROM achievement_tiers WHERE achievement_id = ?1",
            params![achievement_id],
        )?;
        for (difficulty, threshold) in &def.tiers {
            tx.execute(
                "INSERT INTO achievement_tiers (achievement_id, difficulty, threshold)
                 VALUES (?1, ?2, ?3)",
                params![achievement_id, difficulty.as_str(), threshold],
            )?;
            report.tiers += 1;
        }

        if existing.is_some() {
            report.updated += 1;
        } else {
            report.created += 1;
        }
    }

    tx.commit()?;
    tracing::info!(
        created = report.created,
        updated = report.updated,
        tiers = report.tiers,
        "achievement catalog installed"
    );
    Ok(report)
}

const DEF_COLUMNS: &str =
    "achievement_id, code_name, name, description, media_type, kind, dimension, value";

fn row_to_def(row: &Row<'_>) -> rusqlite::Result<AchievementDef> {
    let media_type: String = row.get(4)?;
    let dimension: Option<String> = row.get(6)?;
    Ok(AchievementDef {
        achievement_id: row.get(0)?,
        code_name: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        media_type: media_type.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        kind: row.get(5)?,
        dimension: dimension
            .map(|d| {
                d.parse().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        6,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?,
        value: row.get(7)?,
    })
}

/// Every stored achievement, ordered by code name.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn all_achievements(conn: &Connection) -> StoreResult<Vec<AchievementDef>> {
    let sql = format!("SELECT {DEF_COLUMNS} FROM achievements ORDER BY code_name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_def)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Fetch one stored achievement by code name.
pub fn find_achievement(conn: &Connection, code_name: &str) -> StoreResult<Option<AchievementDef>> {
    let sql = format!("SELECT {DEF_COLUMNS} FROM achievements WHERE code_name = ?1");
    match conn.query_row(&sql, params![code_name], row_to_def) {
        Ok(def) => Ok(Some(def)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// One `achievement_tiers` row, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TierRow {
    pub tier_id: i64,
    pub achievement_id: i64,
    pub difficulty: Difficulty,
    pub threshold: i64,
    pub rarity: f64,
}

/// Tiers of one achievement, ascending by threshold.
///
/// # Errors
///
/// Returns [`StatsError::Corrupt`] for a stored difficulty label outside
/// the ladder.
pub fn tiers_of(conn: &Connection, achievement_id: i64) -> StoreResult<Vec<TierRow>> {
    let mut stmt = conn.prepare(
        "SELECT tier_id, achievement_id, difficulty, threshold, rarity
         FROM achievement_tiers
         WHERE achievement_id = ?1
         ORDER BY threshold ASC",
    )?;
    let rows = stmt.query_map(params![achievement_id], |row| {
        let difficulty: String = row.get(2)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            difficulty,
            row.get::<_, i64>(3)?,
            row.get::<_, f64>(4)?,
        ))
    })?;

    let mut tiers = Vec::new();
    for row in rows {
        let (tier_id, achievement_id, difficulty, threshold, rarity) = row?;
        let difficulty = difficulty
            .parse::<Difficulty>()
            .map_err(|e| StatsError::Corrupt {
                table: "achievement_tiers",
                detail: e.to_string(),
            })?;
        tiers.push(TierRow {
            tier_id,
            achievement_id,
            difficulty,
            threshold,
            rarity,
        });
    }
    Ok(tiers)
}
