//! Population rarity: what share of eligible users completed each tier.
//!
//! Rarity is deliberately not maintained by the batch calculator; it is a
//! separate, cheaper pass run on its own schedule. Eligible means holding
//! an *active* aggregate of the achievement's media type, so opted-out
//! users dilute nothing.

use medley_core::error::Result;
use rusqlite::{Connection, TransactionBehavior, params};
use serde::Serialize;

/// What one rarity pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RarityReport {
    /// Tier rows recomputed.
    pub tiers: usize,
}

/// Recompute `rarity` for every tier in one set-based statement.
///
/// A tier with no eligible users gets rarity 0. Completions by users who
/// deactivated afterwards can push the raw share past 1, so it is capped.
///
/// # Errors
///
/// Returns a storage error if the statement fails; nothing is partially
/// recomputed.
pub fn recompute(conn: &mut Connection, now_us: i64) -> Result<RarityReport> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tiers = tx.execute(
        "UPDATE achievement_tiers
         SET rarity = MIN(1.0, COALESCE(
             CAST((SELECT COUNT(*)
                   FROM user_achievement_progress p
                   WHERE p.tier_id = achievement_tiers.tier_id
                     AND p.completed = 1) AS REAL)
             / NULLIF((SELECT COUNT(*)
                       FROM media_aggregates a
                       JOIN achievements ach
                         ON ach.achievement_id = achievement_tiers.achievement_id
                       WHERE a.media_type = ach.media_type AND a.active = 1), 0),
             0))",
        [],
    )?;
    tx.execute(
        "UPDATE engine_meta SET last_rarity_run_us = ?1 WHERE id = 1",
        params![now_us],
    )?;
    tx.commit()?;

    tracing::info!(tiers, "rarity recomputed");
    Ok(RarityReport { tiers })
}
