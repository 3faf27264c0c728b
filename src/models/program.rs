//! Guide programs and the episode identity attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single guide entry. Immutable snapshot; a guide refresh may replace the
/// time window of a program while keeping its id (the "moved program" case).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: i32,
    pub channel_id: i32,
    pub title: String,
    pub description: String,
    /// Half-open interval `[start, end)`.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Raw genre text from the guide.
    pub genre: String,
    /// Classified genre, filled in by the engine's genre map.
    pub epg_genre: Option<EpgGenre>,
    pub star_rating: i32,
    pub season_number: Option<String>,
    pub episode_number: Option<String>,
    pub episode_title: Option<String>,
}

impl Program {
    /// Whether the program overlaps the half-open interval `[from, to)`.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start < to && self.end > from
    }

    /// Episode identity from the structured guide fields, if both parse.
    pub fn episode_number(&self) -> Option<EpisodeNumber> {
        let season = self.season_number.as_deref()?.trim().parse().ok()?;
        let episode = self.episode_number.as_deref()?.trim().parse().ok()?;
        Some(EpisodeNumber { season, episode })
    }
}

/// `(season, episode)` identity of a series program. Ordering is
/// lexicographic, so "newer episode" means strictly greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeNumber {
    pub season: u32,
    pub episode: u32,
}

impl std::fmt::Display for EpisodeNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Normalized guide genre, mapped from free-form genre text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EpgGenre {
    Series,
    Movie,
    Documentary,
    Music,
    Kids,
    News,
    Sport,
    Special,
}
