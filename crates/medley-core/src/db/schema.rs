//! Canonical SQLite schema for the statistics engine.
//!
//! The schema keeps three families of tables:
//! - current state: `users`, `media_aggregates`, `list_entries`, `media_tags`
//! - history: `activity_log` (append-only ledger) and `stats_history`
//!   (full-row snapshots written after every delta)
//! - achievements: `achievements`, `achievement_tiers`,
//!   `user_achievement_progress`, written only by the batch calculator
//! - `engine_meta` tracks schema version and batch job bookkeeping
//!
//! `status_counts` is a JSON object column (status label → count); the
//! cross-field invariants that SQL CHECKs cannot express (status counts
//! summing to `total_entries`) are enforced by the applicator before any
//! row is written.

/// Migration v1: users, aggregates, ledger, history, list entries, tags.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS media_aggregates (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    media_type TEXT NOT NULL CHECK (media_type IN ('series', 'anime', 'movie', 'book', 'game', 'manga')),
    time_spent_min INTEGER NOT NULL DEFAULT 0 CHECK (time_spent_min >= 0),
    total_entries INTEGER NOT NULL DEFAULT 0 CHECK (total_entries >= 0),
    total_redo INTEGER NOT NULL DEFAULT 0 CHECK (total_redo >= 0),
    entries_rated INTEGER NOT NULL DEFAULT 0 CHECK (entries_rated >= 0 AND entries_rated <= total_entries),
    sum_entries_rated REAL NOT NULL DEFAULT 0,
    entries_commented INTEGER NOT NULL DEFAULT 0 CHECK (entries_commented >= 0),
    entries_favorites INTEGER NOT NULL DEFAULT 0 CHECK (entries_favorites >= 0),
    total_specific INTEGER NOT NULL DEFAULT 0 CHECK (total_specific >= 0),
    status_counts TEXT NOT NULL DEFAULT '{}',
    active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (user_id, media_type)
);

CREATE TABLE IF NOT EXISTS activity_log (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    media_id INTEGER NOT NULL,
    media_type TEXT NOT NULL CHECK (media_type IN ('series', 'anime', 'movie', 'book', 'game', 'manga')),
    specific_gained INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0 CHECK (is_completed IN (0, 1)),
    is_redo INTEGER NOT NULL DEFAULT 0 CHECK (is_redo IN (0, 1)),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS stats_history (
    snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    media_type TEXT NOT NULL CHECK (media_type IN ('series', 'anime', 'movie', 'book', 'game', 'manga')),
    recorded_at_us INTEGER NOT NULL,
    time_spent_min INTEGER NOT NULL CHECK (time_spent_min >= 0),
    total_entries INTEGER NOT NULL CHECK (total_entries >= 0),
    total_redo INTEGER NOT NULL CHECK (total_redo >= 0),
    entries_rated INTEGER NOT NULL CHECK (entries_rated >= 0),
    sum_entries_rated REAL NOT NULL DEFAULT 0,
    entries_commented INTEGER NOT NULL CHECK (entries_commented >= 0),
    entries_favorites INTEGER NOT NULL CHECK (entries_favorites >= 0),
    total_specific INTEGER NOT NULL CHECK (total_specific >= 0),
    status_counts TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS list_entries (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    media_type TEXT NOT NULL CHECK (media_type IN ('series', 'anime', 'movie', 'book', 'game', 'manga')),
    media_id INTEGER NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('in_progress', 'completed', 'on_hold', 'dropped', 'planned')),
    rating REAL CHECK (rating IS NULL OR (rating >= 0 AND rating <= 10)),
    is_favorite INTEGER NOT NULL DEFAULT 0 CHECK (is_favorite IN (0, 1)),
    has_comment INTEGER NOT NULL DEFAULT 0 CHECK (has_comment IN (0, 1)),
    redo_count INTEGER NOT NULL DEFAULT 0 CHECK (redo_count >= 0),
    specific INTEGER NOT NULL DEFAULT 0 CHECK (specific >= 0),
    time_spent_min INTEGER NOT NULL DEFAULT 0 CHECK (time_spent_min >= 0),
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (user_id, media_type, media_id)
);

CREATE TABLE IF NOT EXISTS media_tags (
    media_type TEXT NOT NULL CHECK (media_type IN ('series', 'anime', 'movie', 'book', 'game', 'manga')),
    media_id INTEGER NOT NULL,
    dimension TEXT NOT NULL CHECK (dimension IN ('genre', 'actor', 'director', 'author', 'studio', 'platform', 'developer', 'network')),
    value TEXT NOT NULL CHECK (length(trim(value)) > 0),
    PRIMARY KEY (media_type, media_id, dimension, value)
);

CREATE TABLE IF NOT EXISTS engine_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_achievement_run_us INTEGER NOT NULL DEFAULT 0,
    last_rarity_run_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO engine_meta (
    id,
    schema_version,
    last_achievement_run_us,
    last_rarity_run_us
) VALUES (1, 1, 0, 0);
"#;

/// Migration v2: achievement tables and read-path indexes.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS achievements (
    achievement_id INTEGER PRIMARY KEY AUTOINCREMENT,
    code_name TEXT NOT NULL UNIQUE CHECK (length(trim(code_name)) > 0),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    media_type TEXT NOT NULL CHECK (media_type IN ('series', 'anime', 'movie', 'book', 'game', 'manga')),
    kind TEXT NOT NULL CHECK (length(trim(kind)) > 0),
    dimension TEXT,
    value TEXT
);

CREATE TABLE IF NOT EXISTS achievement_tiers (
    tier_id INTEGER PRIMARY KEY AUTOINCREMENT,
    achievement_id INTEGER NOT NULL REFERENCES achievements(achievement_id) ON DELETE CASCADE,
    difficulty TEXT NOT NULL CHECK (difficulty IN ('bronze', 'silver', 'gold', 'platinum', 'diamond')),
    threshold INTEGER NOT NULL CHECK (threshold > 0),
    rarity REAL NOT NULL DEFAULT 0 CHECK (rarity >= 0 AND rarity <= 1),
    UNIQUE (achievement_id, difficulty)
);

CREATE TABLE IF NOT EXISTS user_achievement_progress (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    tier_id INTEGER NOT NULL REFERENCES achievement_tiers(tier_id) ON DELETE CASCADE,
    count INTEGER NOT NULL DEFAULT 0,
    progress INTEGER NOT NULL DEFAULT 0 CHECK (progress >= 0 AND progress <= 100),
    completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
    completed_at_us INTEGER,
    last_calculated_at_us INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, tier_id)
);

CREATE INDEX IF NOT EXISTS idx_activity_user_type_created
    ON activity_log(user_id, media_type, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_history_user_type_recorded
    ON stats_history(user_id, media_type, recorded_at_us);

CREATE INDEX IF NOT EXISTS idx_entries_user_type_status
    ON list_entries(user_id, media_type, status);

CREATE INDEX IF NOT EXISTS idx_entries_type_media
    ON list_entries(media_type, media_id);

CREATE INDEX IF NOT EXISTS idx_tags_type_dim_value
    ON media_tags(media_type, dimension, value, media_id);

CREATE INDEX IF NOT EXISTS idx_aggregates_type_active
    ON media_aggregates(media_type, active);

CREATE INDEX IF NOT EXISTS idx_tiers_achievement
    ON achievement_tiers(achievement_id, threshold);

CREATE INDEX IF NOT EXISTS idx_progress_tier_completed
    ON user_achievement_progress(tier_id, completed);

UPDATE engine_meta
SET schema_version = 2
WHERE id = 1;
"#;

/// Indexes expected by the ledger, trend, recipe, and ranking read paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_activity_user_type_created",
    "idx_history_user_type_recorded",
    "idx_entries_user_type_status",
    "idx_entries_type_media",
    "idx_tags_type_dim_value",
    "idx_aggregates_type_active",
    "idx_tiers_achievement",
    "idx_progress_tier_completed",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn seeded_conn() -> rusqlite::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;

        for user in 1..=4_i64 {
            conn.execute(
                "INSERT INTO users (user_id, name, created_at_us) VALUES (?1, ?2, ?3)",
                params![user, format!("user-{user}"), user],
            )?;
            conn.execute(
                "INSERT INTO media_aggregates (
                    user_id, media_type, status_counts, active, created_at_us, updated_at_us
                 ) VALUES (?1, 'anime', '{}', 1, ?2, ?2)",
                params![user, user],
            )?;

            for idx in 0..12_i64 {
                let media_id = user * 100 + idx;
                let status = if idx % 3 == 0 { "completed" } else { "planned" };
                conn.execute(
                    "INSERT INTO list_entries (
                        user_id, media_type, media_id, status, specific,
                        time_spent_min, updated_at_us
                     ) VALUES (?1, 'anime', ?2, ?3, 12, 240, ?4)",
                    params![user, media_id, status, idx],
                )?;
                conn.execute(
                    "INSERT INTO media_tags (media_type, media_id, dimension, value)
                     VALUES ('anime', ?1, 'genre', ?2)",
                    params![media_id, if idx % 2 == 0 { "action" } else { "drama" }],
                )?;
                conn.execute(
                    "INSERT INTO activity_log (
                        user_id, media_id, media_type, specific_gained,
                        is_completed, is_redo, created_at_us
                     ) VALUES (?1, ?2, 'anime', 12, ?3, 0, ?4)",
                    params![user, media_id, i64::from(idx % 3 == 0), idx * 10],
                )?;
                conn.execute(
                    "INSERT INTO stats_history (
                        user_id, media_type, recorded_at_us, time_spent_min,
                        total_entries, total_redo, entries_rated, sum_entries_rated,
                        entries_commented, entries_favorites, total_specific, status_counts
                     ) VALUES (?1, 'anime', ?2, ?3, ?4, 0, 0, 0, 0, 0, ?5, '{}')",
                    params![user, idx * 10, idx * 240, idx, idx * 12],
                )?;
            }
        }

        Ok(conn)
    }

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        stmt.query_map([], |row| row.get::<_, String>(3))?
            .collect::<Result<Vec<_>, _>>()
    }

    #[test]
    fn query_plan_uses_history_range_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT snapshot_id
             FROM stats_history
             WHERE user_id = 2 AND media_type = 'anime'
               AND recorded_at_us BETWEEN 10 AND 90
             ORDER BY recorded_at_us",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_history_user_type_recorded")),
            "expected history index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_ledger_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT event_id
             FROM activity_log
             WHERE user_id = 1 AND media_type = 'anime'
             ORDER BY created_at_us DESC
             LIMIT 20",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_activity_user_type_created")),
            "expected ledger index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_tag_lookup_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT media_id
             FROM media_tags
             WHERE media_type = 'anime' AND dimension = 'genre' AND value = 'action'",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_tags_type_dim_value")),
            "expected tag index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_active_aggregate_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT user_id
             FROM media_aggregates
             WHERE media_type = 'anime' AND active = 1",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_aggregates_type_active")),
            "expected active-aggregate index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn aggregate_checks_reject_bad_rows() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;

        // entries_rated above total_entries violates the row CHECK
        let result = conn.execute(
            "INSERT INTO media_aggregates (
                user_id, media_type, total_entries, entries_rated,
                status_counts, created_at_us, updated_at_us
             ) VALUES (1, 'book', 1, 2, '{}', 0, 0)",
            [],
        );
        assert!(result.is_err());

        // unknown media type string is rejected at the storage level
        let result = conn.execute(
            "INSERT INTO media_aggregates (
                user_id, media_type, status_counts, created_at_us, updated_at_us
             ) VALUES (1, 'podcast', '{}', 0, 0)",
            [],
        );
        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn rating_range_is_checked() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let result = conn.execute(
            "INSERT INTO list_entries (
                user_id, media_type, media_id, status, rating, updated_at_us
             ) VALUES (1, 'anime', 9001, 'completed', 11.0, 0)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }
}
