//! Media-type configuration: the six media kinds and their vocabularies.
//!
//! Every algorithm in this crate is generic over the media type; the
//! differences between kinds (which unit "specific" counts, which statuses
//! exist, which tag dimensions apply) live here as tagged configuration
//! instead of six near-duplicate code paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---- MediaType ----

/// The six media kinds tracked by medley.
///
/// String representation is the lowercase singular noun used in storage
/// and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaType {
    Series,
    Anime,
    Movie,
    Book,
    Game,
    Manga,
}

/// Error returned when parsing an unknown media type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMediaType {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown media type '{}': expected one of series, anime, movie, \
             book, game, manga",
            self.raw
        )
    }
}

impl std::error::Error for UnknownMediaType {}

impl MediaType {
    /// All media types in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Series,
        Self::Anime,
        Self::Movie,
        Self::Book,
        Self::Game,
        Self::Manga,
    ];

    /// Return the canonical lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Anime => "anime",
            Self::Movie => "movie",
            Self::Book => "book",
            Self::Game => "game",
            Self::Manga => "manga",
        }
    }

    /// Label of the media-type-specific unit counted by
    /// `total_specific` (episodes watched, pages read, hours played, ...).
    #[must_use]
    pub const fn specific_unit(self) -> &'static str {
        match self {
            Self::Series | Self::Anime => "episodes",
            Self::Movie => "watches",
            Self::Book => "pages",
            Self::Game => "hours",
            Self::Manga => "chapters",
        }
    }

    /// The status vocabulary for this media type, in display order.
    ///
    /// Movies have no meaningful "in progress" or "on hold" state and use
    /// a reduced vocabulary; every other kind uses the full five.
    #[must_use]
    pub const fn statuses(self) -> &'static [Status] {
        match self {
            Self::Movie => &[Status::Completed, Status::Planned, Status::Dropped],
            _ => &[
                Status::InProgress,
                Status::Completed,
                Status::OnHold,
                Status::Dropped,
                Status::Planned,
            ],
        }
    }

    /// The tag dimensions that exist for this media type.
    #[must_use]
    pub const fn dimensions(self) -> &'static [Dimension] {
        match self {
            Self::Series => &[Dimension::Genre, Dimension::Actor, Dimension::Network],
            Self::Anime => &[Dimension::Genre, Dimension::Studio],
            Self::Movie => &[Dimension::Genre, Dimension::Actor, Dimension::Director],
            Self::Book | Self::Manga => &[Dimension::Genre, Dimension::Author],
            Self::Game => &[Dimension::Genre, Dimension::Platform, Dimension::Developer],
        }
    }

    /// Whether `status` belongs to this media type's vocabulary.
    #[must_use]
    pub fn supports_status(self, status: Status) -> bool {
        self.statuses().contains(&status)
    }

    /// Whether `dimension` exists for this media type.
    #[must_use]
    pub fn supports_dimension(self, dimension: Dimension) -> bool {
        self.dimensions().contains(&dimension)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = UnknownMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "series" => Ok(Self::Series),
            "anime" => Ok(Self::Anime),
            "movie" => Ok(Self::Movie),
            "book" => Ok(Self::Book),
            "game" => Ok(Self::Game),
            "manga" => Ok(Self::Manga),
            _ => Err(UnknownMediaType { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the lowercase string.
impl Serialize for MediaType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ---- Status ----

/// Lifecycle status of a list entry.
///
/// Labels are shared across media types; which subset applies to a kind is
/// decided by [`MediaType::statuses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    InProgress,
    Completed,
    OnHold,
    Dropped,
    Planned,
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown status '{}': expected one of in_progress, completed, \
             on_hold, dropped, planned",
            self.raw
        )
    }
}

impl std::error::Error for UnknownStatus {}

impl Status {
    /// All statuses in display order.
    pub const ALL: [Self; 5] = [
        Self::InProgress,
        Self::Completed,
        Self::OnHold,
        Self::Dropped,
        Self::Planned,
    ];

    /// Return the canonical snake_case string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
            Self::Dropped => "dropped",
            Self::Planned => "planned",
        }
    }

    /// Whether this status means "has not consumed anything yet".
    ///
    /// Planned entries are excluded from affinity grouping and from
    /// completion-flavoured achievement metrics.
    #[must_use]
    pub const fn is_planned(self) -> bool {
        matches!(self, Self::Planned)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "on_hold" => Ok(Self::OnHold),
            "dropped" => Ok(Self::Dropped),
            "planned" => Ok(Self::Planned),
            _ => Err(UnknownStatus { raw: s.to_string() }),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ---- Dimension ----

/// A tag dimension a media entry can be grouped by (genre, actor, ...).
///
/// Which dimensions exist for a given kind is decided by
/// [`MediaType::dimensions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Genre,
    Actor,
    Director,
    Author,
    Studio,
    Platform,
    Developer,
    Network,
}

/// Error returned when parsing an unknown dimension string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDimension {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown dimension '{}': expected one of genre, actor, director, \
             author, studio, platform, developer, network",
            self.raw
        )
    }
}

impl std::error::Error for UnknownDimension {}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Self; 8] = [
        Self::Genre,
        Self::Actor,
        Self::Director,
        Self::Author,
        Self::Studio,
        Self::Platform,
        Self::Developer,
        Self::Network,
    ];

    /// Return the canonical lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Actor => "actor",
            Self::Director => "director",
            Self::Author => "author",
            Self::Studio => "studio",
            Self::Platform => "platform",
            Self::Developer => "developer",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genre" => Ok(Self::Genre),
            "actor" => Ok(Self::Actor),
            "director" => Ok(Self::Director),
            "author" => Ok(Self::Author),
            "studio" => Ok(Self::Studio),
            "platform" => Ok(Self::Platform),
            "developer" => Ok(Self::Developer),
            "network" => Ok(Self::Network),
            _ => Err(UnknownDimension { raw: s.to_string() }),
        }
    }
}

impl Serialize for Dimension {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
