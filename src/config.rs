//! Engine settings.
//!
//! Everything the engine needs beyond its collaborators arrives through
//! [`SchedulerSettings`]; there is no ambient configuration lookup. All
//! fields have serde defaults so a partial config deserializes cleanly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::SchedulerResult;
use crate::models::EpgGenre;

/// Series de-duplication policy applied during expansion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum EpisodeManagementScheme {
    /// Record every matching occurrence.
    #[default]
    None,
    /// Record only episodes newer than everything owned or already booked;
    /// retire superseded pending occurrences.
    NewEpisodesByEpisodeNumber,
    /// Record any episode not yet owned, regardless of airing order.
    MissingEpisodesByEpisodeNumber,
}

/// Guide-drift detection for one-off schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovedProgramsConfig {
    /// Master switch; detection is skipped entirely when false.
    #[serde(default)]
    pub detect: bool,
    /// How far (± minutes) around the scheduled start to search for the
    /// program's new slot.
    #[serde(default = "default_moved_window_min")]
    pub window_min: f64,
    /// Detection arms this many minutes before the scheduled start.
    #[serde(default = "default_moved_offset_min")]
    pub offset_min: f64,
}

fn default_moved_window_min() -> f64 {
    15.0
}

fn default_moved_offset_min() -> f64 {
    15.0
}

impl Default for MovedProgramsConfig {
    fn default() -> Self {
        Self {
            detect: false,
            window_min: default_moved_window_min(),
            offset_min: default_moved_offset_min(),
        }
    }
}

/// Free-form genre text to normalized genre mapping. Comparison is
/// case-insensitive full equality per mapped text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenreMap {
    #[serde(default)]
    pub mappings: HashMap<EpgGenre, Vec<String>>,
}

impl GenreMap {
    pub fn add(&mut self, genre: EpgGenre, text: impl Into<String>) {
        self.mappings.entry(genre).or_default().push(text.into());
    }

    pub fn classify(&self, genre_text: &str) -> Option<EpgGenre> {
        self.mappings.iter().find_map(|(genre, texts)| {
            texts
                .iter()
                .any(|t| t.eq_ignore_ascii_case(genre_text))
                .then_some(*genre)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default)]
    pub episode_management: EpisodeManagementScheme,
    #[serde(default)]
    pub moved_programs: MovedProgramsConfig,
    /// Planning horizon in days for expansion and allocation.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// Background recheck cadence in seconds, used when no cron expression
    /// is configured.
    #[serde(default = "default_recheck_interval_secs")]
    pub recheck_interval_secs: u64,
    /// Optional cron expression for the background recheck; falls back to
    /// the fixed interval when absent or unparsable.
    #[serde(default)]
    pub recheck_cron: Option<String>,
    /// Fallback pattern for extracting episode identity from program
    /// descriptions when the guide carries no structured episode fields.
    /// Named capture groups `SeasonNo` and `EpisodeNo` carry the numbers.
    #[serde(default)]
    pub episode_info_regex: Option<String>,
    #[serde(default)]
    pub genre_map: GenreMap,
}

fn default_horizon_days() -> u32 {
    14
}

fn default_recheck_interval_secs() -> u64 {
    300
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            episode_management: EpisodeManagementScheme::None,
            moved_programs: MovedProgramsConfig::default(),
            horizon_days: default_horizon_days(),
            recheck_interval_secs: default_recheck_interval_secs(),
            recheck_cron: None,
            episode_info_regex: None,
            genre_map: GenreMap::default(),
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.horizon_days == 0 {
            return Err(crate::errors::SchedulerError::validation(
                "horizon_days must be at least 1",
            ));
        }
        if self.moved_programs.window_min < 0.0 || self.moved_programs.offset_min < 0.0 {
            return Err(crate::errors::SchedulerError::validation(
                "moved program window and offset must not be negative",
            ));
        }
        Ok(())
    }
}
