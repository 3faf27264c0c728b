//! Search rules: criteria-based generators of recording intents.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::schedule::{KeepMethod, SchedulePriority};

/// Program field a rule target inspects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum RuleSearchField {
    Title,
    Genre,
    Description,
    StarRating,
}

/// How target text is compared. `Exact` is a case-insensitive full match,
/// `Include` a case-insensitive substring match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum RuleSearchMatch {
    Exact,
    Include,
}

/// One search criterion; a rule requires all of its targets to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTarget {
    pub field: RuleSearchField,
    pub match_kind: RuleSearchMatch,
    pub text: String,
}

impl RuleTarget {
    pub fn new(field: RuleSearchField, match_kind: RuleSearchMatch, text: impl Into<String>) -> Self {
        Self { field, match_kind, text: text.into() }
    }
}

/// How many of a rule's matches become recordings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum RuleRecordingType {
    /// Record the earliest match only, then deactivate the rule.
    Once,
    /// Record every match on the channel of the first match.
    AllOnSameChannel,
    /// Record every match anywhere.
    All,
}

/// Where to find `(season, episode)` when the guide carries no structured
/// episode fields.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum EpisodeInfoFallback {
    None,
    /// Apply the rule's regex to the program description; named capture
    /// groups `SeasonNo` and `EpisodeNo` carry the numbers.
    DescriptionRegex,
}

/// A stored search rule. Evaluated on demand against the live guide; expanded
/// instances are never persisted on the rule itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub id: i32,
    pub name: String,
    /// Inactive rules expand to nothing. Cleared automatically for
    /// [`RuleRecordingType::Once`] rules after their match is booked.
    pub active: bool,
    pub targets: Vec<RuleTarget>,
    /// Restrict matching to one channel group.
    pub channel_group_id: Option<i32>,
    /// Restrict matching to one channel.
    pub channel_id: Option<i32>,
    /// Time-of-day window, anchored per candidate day like a schedule.
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    /// Absolute validity bounds for the rule itself.
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
    /// Declares the rule series-aware and names the series for episode
    /// ownership lookups.
    pub series_name: Option<String>,
    pub season_filter: Option<String>,
    pub episode_filter: Option<String>,
    pub episode_title_filter: Option<String>,
    /// Pattern used by [`EpisodeInfoFallback::DescriptionRegex`].
    pub episode_info_regex: Option<String>,
    pub episode_info_fallback: EpisodeInfoFallback,
    pub recording_type: RuleRecordingType,
    #[serde(with = "super::schedule::duration_minutes")]
    pub pre_padding: Duration,
    #[serde(with = "super::schedule::duration_minutes")]
    pub post_padding: Duration,
    pub priority: SchedulePriority,
    pub keep_method: KeepMethod,
    pub keep_date: Option<DateTime<Utc>>,
}

impl ScheduleRule {
    pub fn is_series(&self) -> bool {
        self.series_name.is_some()
    }

    /// Whether the rule may produce bookings at the given instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.active_from.is_none_or(|from| now >= from)
            && self.active_to.is_none_or(|to| now <= to)
    }
}
