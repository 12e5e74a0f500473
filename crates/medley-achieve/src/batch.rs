//! The set-based batch tier calculator.
//!
//! One run recomputes every user's progress for every achievement. Each
//! achievement is its own unit of work (one write transaction): a failure
//! there is logged and the run moves on, so a bad definition can never
//! block the rest. Per tier, ascending, progress is written by exactly one
//! bulk UPDATE plus one bulk INSERT for users with no row yet — never a
//! per-user loop.
//!
//! Reruns over unchanged data are byte-identical: the UPDATE carries a
//! change guard, so untouched users keep their `completed_at_us` *and*
//! their `last_calculated_at_us`.

use crate::catalog;
use crate::recipe::{AchievementDef, Recipe};
use medley_core::error::Result;
use rusqlite::{Connection, ToSql, TransactionBehavior, params};
use serde::Serialize;

/// What one batch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Achievements whose batch committed.
    pub achievements: usize,
    pub rows_updated: usize,
    pub rows_inserted: usize,
    /// Achievements whose batch failed, with the error text.
    pub failures: Vec<BatchFailure>,
}

/// A single achievement's failed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub code_name: String,
    pub error: String,
}

/// Run the batch for every stored achievement.
///
/// # Errors
///
/// Returns a storage error only for store-wide failures (listing the
/// catalog, stamping the run). Per-achievement failures land in the
/// report's `failures` instead.
pub fn run_all(conn: &mut Connection, now_us: i64) -> Result<BatchReport> {
    let defs = catalog::all_achievements(conn)?;
    let mut report = BatchReport::default();

    for def in &defs {
        match run_one(conn, def, now_us) {
            Ok((updated, inserted)) => {
                report.achievements += 1;
                report.rows_updated += updated;
                report.rows_inserted += inserted;
                tracing::info!(
                    code_name = %def.code_name,
                    updated,
                    inserted,
                    "achievement batch committed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    code_name = %def.code_name,
                    error = %e,
                    "achievement batch failed; run continues"
                );
                report.failures.push(BatchFailure {
                    code_name: def.code_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    conn.execute(
        "UPDATE engine_meta SET last_achievement_run_us = ?1 WHERE id = 1",
        params![now_us],
    )?;
    Ok(report)
}

/// Run one achievement's batch in its own transaction.
///
/// Returns (rows updated, rows inserted) across all tiers.
///
/// # Errors
///
/// Recipe construction and tier statements fail with the usual taxonomy;
/// nothing is committed for this achievement on failure.
pub fn run_one(
    conn: &mut Connection,
    def: &AchievementDef,
    now_us: i64,
) -> Result<(usize, usize)> {
    let recipe = Recipe::for_achievement(def)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tiers = catalog::tiers_of(&tx, def.achievement_id)?;

    let mut updated = 0;
    let mut inserted = 0;
    for tier in &tiers {
        let update_sql = format!(
            "UPDATE user_achievement_progress AS uap SET
                count = m.value,
                progress = MIN(100, m.value * 100 / :threshold),
                completed = CASE
                    WHEN uap.completed = 1 OR m.value >= :threshold THEN 1
                    ELSE 0 END,
                completed_at_us = CASE
                    WHEN uap.completed = 0 AND m.value >= :threshold THEN :now_us
                    ELSE uap.completed_at_us END,
                last_calculated_at_us = :now_us
             FROM ({recipe_sql}) AS m
             WHERE uap.tier_id = :tier_id
               AND uap.user_id = m.user_id
               AND (uap.count <> m.value
                    OR (uap.completed = 0 AND m.value >= :threshold))",
            recipe_sql = recipe.sql
        );
        let insert_sql = format!(
            "INSERT INTO user_achievement_progress
                (user_id, tier_id, count, progress, completed, completed_at_us,
                 last_calculated_at_us)
             SELECT m.user_id, :tier_id, m.value,
                    MIN(100, m.value * 100 / :threshold),
                    CASE WHEN m.value >= :threshold THEN 1 ELSE 0 END,
                    CASE WHEN m.value >= :threshold THEN :now_us ELSE NULL END,
                    :now_us
             FROM ({recipe_sql}) AS m
             WHERE NOT EXISTS (
                 SELECT 1 FROM user_achievement_progress p
                 WHERE p.user_id = m.user_id AND p.tier_id = :tier_id
             )",
            recipe_sql = recipe.sql
        );

        let mut bound: Vec<(&str, &dyn ToSql)> = vec![
            (":tier_id", &tier.tier_id),
            (":threshold", &tier.threshold),
            (":now_us", &now_us),
        ];
        for (name, value) in &recipe.params {
            bound.push((name, value));
        }

        updated += tx.execute(&update_sql, &bound[..])?;
        inserted += tx.execute(&insert_sql, &bound[..])?;
    }

    tx.commit()?;
    Ok((updated, inserted))
}
