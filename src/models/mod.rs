//! Domain model for the recording scheduler.
//!
//! Everything here is a plain value type: snapshots handed in by the
//! providers or produced by the planner. Mutation happens only through
//! the engine and its backing store.

use serde::{Deserialize, Serialize};

pub mod card;
pub mod channel;
pub mod plan;
pub mod program;
pub mod rule;
pub mod schedule;

pub use card::{Card, TransponderKey, TuningDetail};
pub use channel::{Channel, ChannelGroup};
pub use plan::{Booking, Conflict, RecordingPlan, RecordingStatus};
pub use program::{EpgGenre, EpisodeNumber, Program};
pub use rule::{
    EpisodeInfoFallback, RuleRecordingType, RuleSearchField, RuleSearchMatch, RuleTarget,
    ScheduleRule,
};
pub use schedule::{
    CancelledInstance, KeepMethod, RecordingType, Schedule, SchedulePriority, ScheduleUpdate,
};

/// Broadcast medium of a channel or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Tv,
    Radio,
}

/// A recording already present in the backend's archive, used to skip
/// re-recording non-series content by title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub title: String,
}
