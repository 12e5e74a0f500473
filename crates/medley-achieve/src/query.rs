//! Read side: per-user progress listings and population difficulty
//! summaries, shaped for presentation.

use crate::recipe::Difficulty;
use medley_core::error::{Result, StatsError};
use medley_core::media::MediaType;
use rusqlite::{Connection, Row, named_params};
use serde::Serialize;

/// One tier of one achievement, with the user's progress folded in.
/// Users the batch has never touched read as all-zero progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub code_name: String,
    pub name: String,
    pub description: String,
    pub media_type: MediaType,
    pub difficulty: Difficulty,
    pub threshold: i64,
    pub rarity: f64,
    pub count: i64,
    pub progress: i64,
    pub completed: bool,
    pub completed_at_us: Option<i64>,
}

const PROGRESS_COLUMNS: &str = "a.code_name, a.name, a.description, a.media_type, \
     t.difficulty, t.threshold, t.rarity, \
     COALESCE(p.count, 0), COALESCE(p.progress, 0), COALESCE(p.completed, 0), \
     p.completed_at_us";

fn row_to_progress(row: &Row<'_>) -> rusqlite::Result<UserProgress> {
    let media_type: String = row.get(3)?;
    let difficulty: String = row.get(4)?;
    Ok(UserProgress {
        code_name: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        media_type: media_type.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        difficulty: difficulty.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        threshold: row.get(5)?,
        rarity: row.get(6)?,
        count: row.get(7)?,
        progress: row.get(8)?,
        completed: row.get(9)?,
        completed_at_us: row.get(10)?,
    })
}

/// Every tier's progress for one user, optionally narrowed to one media
/// type, ordered by achievement code name then ascending threshold.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn user_progress(
    conn: &Connection,
    user_id: i64,
    media_type: Option<MediaType>,
) -> Result<Vec<UserProgress>> {
    let mut rows = Vec::new();
    if let Some(mt) = media_type {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS}
             FROM achievements a
             JOIN achievement_tiers t ON t.achievement_id = a.achievement_id
             LEFT JOIN user_achievement_progress p
                    ON p.tier_id = t.tier_id AND p.user_id = :user_id
             WHERE a.media_type = :media_type
             ORDER BY a.code_name, t.threshold"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map(
            named_params! { ":user_id": user_id, ":media_type": mt.as_str() },
            row_to_progress,
        )?;
        for row in mapped {
            rows.push(row?);
        }
    } else {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS}
             FROM achievements a
             JOIN achievement_tiers t ON t.achievement_id = a.achievement_id
             LEFT JOIN user_achievement_progress p
                    ON p.tier_id = t.tier_id AND p.user_id = :user_id
             ORDER BY a.code_name, t.threshold"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map(named_params! { ":user_id": user_id }, row_to_progress)?;
        for row in mapped {
            rows.push(row?);
        }
    }
    Ok(rows)
}

/// Per-difficulty tier counts for one user: how many tiers exist at that
/// difficulty and how many the user completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DifficultySummary {
    pub difficulty: Difficulty,
    pub completed: i64,
    pub total: i64,
}

/// Difficulty summaries, ascending bronze → diamond, optionally narrowed
/// to one media type. Difficulties with no tiers are omitted.
///
/// # Errors
///
/// Returns [`StatsError::Corrupt`] for a stored difficulty outside the
/// ladder.
pub fn difficulty_summary(
    conn: &Connection,
    user_id: i64,
    media_type: Option<MediaType>,
) -> Result<Vec<DifficultySummary>> {
    let filter = if media_type.is_some() {
        "WHERE a.media_type = :media_type"
    } else {
        ""
    };
    let sql = format!(
        "SELECT t.difficulty,
                SUM(CASE WHEN p.completed = 1 THEN 1 ELSE 0 END) AS completed,
                COUNT(*) AS total
         FROM achievement_tiers t
         JOIN achievements a ON a.achievement_id = t.achievement_id
         LEFT JOIN user_achievement_progress p
                ON p.tier_id = t.tier_id AND p.user_id = :user_id
         {filter}
         GROUP BY t.difficulty"
    );
    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &Row<'_>| -> rusqlite::Result<(String, i64, i64)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    };
    let raw: Vec<(String, i64, i64)> = if let Some(mt) = media_type {
        let mapped = stmt.query_map(
            named_params! { ":user_id": user_id, ":media_type": mt.as_str() },
            map_row,
        )?;
        mapped.collect::<rusqlite::Result<_>>()?
    } else {
        let mapped = stmt.query_map(named_params! { ":user_id": user_id }, map_row)?;
        mapped.collect::<rusqlite::Result<_>>()?
    };

    let mut summaries = Vec::with_capacity(raw.len());
    for (difficulty, completed, total) in raw {
        let difficulty = difficulty
            .parse::<Difficulty>()
            .map_err(|e| StatsError::Corrupt {
                table: "achievement_tiers",
                detail: e.to_string(),
            })?;
        summaries.push(DifficultySummary {
            difficulty,
            completed,
            total,
        });
    }
    summaries.sort_by_key(|s| s.difficulty);
    Ok(summaries)
}
