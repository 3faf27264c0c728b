//! Recording schedules: recurrence descriptors plus per-occurrence
//! cancellation markers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Title prefix for recordings created from a bare time window. Such
/// schedules have no backing guide program, so removal falls back to the
/// overlap heuristic in the engine.
pub const MANUAL_TITLE_PREFIX: &str = "Manual recording";

/// How a schedule recurs. Everything except `Once` describes a series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum RecordingType {
    Once,
    Daily,
    Weekly,
    EveryTimeOnThisChannel,
    EveryTimeOnEveryChannel,
    Weekends,
    WorkingDays,
    WeeklyEveryTimeOnThisChannel,
}

impl RecordingType {
    pub fn is_series(&self) -> bool {
        !matches!(self, RecordingType::Once)
    }
}

/// Conflict-resolution priority. Higher wins; ties fall back to creation
/// order. Note this is unrelated to [`super::Card::priority`], where lower
/// numbers are preferred.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
pub enum SchedulePriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

impl SchedulePriority {
    /// Lossy conversion from the numeric priority used by provider APIs.
    /// Out-of-range values clamp to the nearest level.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=0 => SchedulePriority::Lowest,
            1 => SchedulePriority::Low,
            2 => SchedulePriority::Normal,
            3 => SchedulePriority::High,
            _ => SchedulePriority::Highest,
        }
    }
}

/// Retention policy for the finished recording. Pass-through for the
/// external recorder; the engine never interprets it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum KeepMethod {
    UntilSpaceNeeded,
    UntilWatched,
    TillDate,
    Always,
}

/// A recording intent: one concrete time window plus a recurrence pattern.
/// The schedule itself never stores expanded instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i32,
    pub channel_id: i32,
    /// Program title for guide-backed schedules, or a manual marker title.
    pub name: String,
    /// Anchor date and time of day; for recurring types the time of day is
    /// re-anchored onto each candidate day.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recording_type: RecordingType,
    #[serde(with = "duration_minutes")]
    pub pre_padding: Duration,
    #[serde(with = "duration_minutes")]
    pub post_padding: Duration,
    pub priority: SchedulePriority,
    pub keep_method: KeepMethod,
    pub keep_date: Option<DateTime<Utc>>,
    /// Set when this schedule was materialized from a rule.
    pub rule_id: Option<i32>,
}

impl Schedule {
    pub fn is_series(&self) -> bool {
        self.recording_type.is_series()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Title for a schedule created from a bare time window.
    pub fn manual_title(channel_name: &str) -> String {
        format!("{MANUAL_TITLE_PREFIX} ({channel_name})")
    }

    pub fn is_manual(&self) -> bool {
        self.name.starts_with(MANUAL_TITLE_PREFIX)
    }
}

/// Partial update for an existing schedule; `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    pub channel_id: Option<i32>,
    pub name: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub recording_type: Option<RecordingType>,
    #[serde(default, with = "opt_duration_minutes")]
    pub pre_padding: Option<Duration>,
    #[serde(default, with = "opt_duration_minutes")]
    pub post_padding: Option<Duration>,
    pub priority: Option<SchedulePriority>,
}

/// Suppresses exactly one occurrence of a recurring schedule, keyed by the
/// occurrence's channel and computed start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancelledInstance {
    pub channel_id: i32,
    pub start: DateTime<Utc>,
}

pub(crate) mod duration_minutes {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_minutes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::minutes(i64::deserialize(deserializer)?))
    }
}

mod opt_duration_minutes {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.num_minutes()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::minutes))
    }
}
