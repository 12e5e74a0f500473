//! Metric recipes: what an achievement measures, and the SQL that measures
//! it for every user at once.
//!
//! A recipe always yields one `(user_id, value)` row per user who has any
//! signal, grouped by user in a single sub-query. Recipes read the raw
//! list data (`list_entries`, `media_tags`), never the aggregate rows, so
//! a drifted aggregate can never grant an achievement.

use medley_core::error::{Result, StatsError};
use medley_core::media::{Dimension, MediaType, Status};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---- Difficulty ----

/// Tier difficulty ladder, ascending. The derived ordering is the ladder
/// order, so sorting tiers by difficulty sorts them bronze-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Error returned when parsing an unknown difficulty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDifficulty {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown difficulty '{}' (expected bronze, silver, gold, platinum or diamond)",
            self.raw
        )
    }
}

impl std::error::Error for UnknownDifficulty {}

impl Difficulty {
    /// Every difficulty, ascending.
    pub const ALL: [Self; 5] = [
        Self::Bronze,
        Self::Silver,
        Self::Gold,
        Self::Platinum,
        Self::Diamond,
    ];

    /// Canonical lowercase label, as stored in `achievement_tiers`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
            Self::Diamond => "diamond",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            "diamond" => Ok(Self::Diamond),
            _ => Err(UnknownDifficulty { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the lowercase string.
impl Serialize for Difficulty {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ---- Metric kinds ----

/// The computation an achievement runs over the list data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Completed entries of the media type.
    Count,
    /// Completed entries tagged with a specific dimension value
    /// ("complete 25 horror movies").
    TaggedCount,
    /// Distinct dimension values across completed entries
    /// ("watch series from 20 networks").
    DistinctCount,
    /// Largest completed-entry count within one dimension value
    /// ("most series featuring the same actor").
    MaxGroupCount,
    /// Whole hours of time spent, across every status.
    TimeSum,
}

/// Error returned when parsing an unknown metric kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetricKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownMetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metric kind '{}'", self.raw)
    }
}

impl std::error::Error for UnknownMetricKind {}

impl MetricKind {
    /// Every metric kind.
    pub const ALL: [Self; 5] = [
        Self::Count,
        Self::TaggedCount,
        Self::DistinctCount,
        Self::MaxGroupCount,
        Self::TimeSum,
    ];

    /// Canonical snake_case label, as stored in `achievements.kind`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::TaggedCount => "tagged_count",
            Self::DistinctCount => "distinct_count",
            Self::MaxGroupCount => "max_group_count",
            Self::TimeSum => "time_sum",
        }
    }

    /// Whether the recipe needs a dimension to group or filter on.
    #[must_use]
    pub const fn needs_dimension(self) -> bool {
        matches!(
            self,
            Self::TaggedCount | Self::DistinctCount | Self::MaxGroupCount
        )
    }

    /// Whether the recipe needs a concrete dimension value.
    #[must_use]
    pub const fn needs_value(self) -> bool {
        matches!(self, Self::TaggedCount)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = UnknownMetricKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Self::Count),
            "tagged_count" => Ok(Self::TaggedCount),
            "distinct_count" => Ok(Self::DistinctCount),
            "max_group_count" => Ok(Self::MaxGroupCount),
            "time_sum" => Ok(Self::TimeSum),
            _ => Err(UnknownMetricKind { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the snake_case string.
impl Serialize for MetricKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ---- Recipe SQL ----

/// A built metric query: SQL yielding `(user_id, value)` grouped by user,
/// plus the named bindings the SQL references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub sql: String,
    pub params: Vec<(&'static str, String)>,
}

/// One `achievements` row, as stored. `kind` stays a raw string here so a
/// row written by a newer catalog fails its own batch instead of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementDef {
    pub achievement_id: i64,
    pub code_name: String,
    pub name: String,
    pub description: String,
    pub media_type: MediaType,
    pub kind: String,
    pub dimension: Option<Dimension>,
    pub value: Option<String>,
}

impl Recipe {
    /// Build the metric query for one achievement definition.
    ///
    /// # Errors
    ///
    /// [`StatsError::RecipeNotFound`] for an unknown kind,
    /// [`StatsError::UnsupportedDimension`] when the dimension does not
    /// exist for the media type, and [`StatsError::Corrupt`] when a kind
    /// that needs a dimension or value was stored without one.
    pub fn for_achievement(def: &AchievementDef) -> Result<Self> {
        let kind: MetricKind = def.kind.parse().map_err(|_| StatsError::RecipeNotFound {
            code_name: def.code_name.clone(),
            kind: def.kind.clone(),
        })?;

        let dimension = match (kind.needs_dimension(), def.dimension) {
            (false, _) => None,
            (true, Some(dimension)) => {
                if !def.media_type.supports_dimension(dimension) {
                    return Err(StatsError::UnsupportedDimension {
                        media_type: def.media_type,
                        dimension: dimension.to_string(),
                    });
                }
                Some(dimension)
            }
            (true, None) => {
                return Err(StatsError::Corrupt {
                    table: "achievements",
                    detail: format!("'{}' ({kind}) has no dimension", def.code_name),
                });
            }
        };
        if kind.needs_value() && def.value.is_none() {
            return Err(StatsError::Corrupt {
                table: "achievements",
                detail: format!("'{}' ({kind}) has no dimension value", def.code_name),
            });
        }

        let completed = Status::Completed.as_str();
        let sql = match kind {
            MetricKind::Count => format!(
                "SELECT user_id, COUNT(*) AS value
                 FROM list_entries
                 WHERE media_type = :media_type AND status = '{completed}'
                 GROUP BY user_id"
            ),
            MetricKind::TaggedCount => format!(
                "SELECT e.user_id AS user_id, COUNT(*) AS value
                 FROM list_entries e
                 JOIN media_tags t
                   ON t.media_type = e.media_type AND t.media_id = e.media_id
                 WHERE e.media_type = :media_type AND e.status = '{completed}'
                   AND t.dimension = :dimension AND t.value = :value
                 GROUP BY e.user_id"
            ),
            MetricKind::DistinctCount => format!(
                "SELECT e.user_id AS user_id, COUNT(DISTINCT t.value) AS value
                 FROM list_entries e
                 JOIN media_tags t
                   ON t.media_type = e.media_type AND t.media_id = e.media_id
                 WHERE e.media_type = :media_type AND e.status = '{completed}'
                   AND t.dimension = :dimension
                 GROUP BY e.user_id"
            ),
            MetricKind::MaxGroupCount => format!(
                "SELECT user_id, MAX(cnt) AS value FROM (
                     SELECT e.user_id AS user_id, COUNT(*) AS cnt
                     FROM list_entries e
                     JOIN media_tags t
                       ON t.media_type = e.media_type AND t.media_id = e.media_id
                     WHERE e.media_type = :media_type AND e.status = '{completed}'
                       AND t.dimension = :dimension
                     GROUP BY e.user_id, t.value
                 ) GROUP BY user_id"
            ),
            MetricKind::TimeSum => "SELECT user_id, SUM(time_spent_min) / 60 AS value
                 FROM list_entries
                 WHERE media_type = :media_type
                 GROUP BY user_id"
                .to_string(),
        };

        let mut params = vec![(":media_type", def.media_type.as_str().to_string())];
        if let Some(dimension) = dimension {
            params.push((":dimension", dimension.as_str().to_string()));
        }
        if kind.needs_value()
            && let Some(value) = &def.value
        {
            params.push((":value", value.clone()));
        }
        Ok(Self { sql, params })
    }
}
