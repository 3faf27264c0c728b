//! Planner output: concrete bookings, card assignments, conflicts and
//! per-program recording statuses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::SchedulePriority;

/// One concrete recording commitment derived from a schedule occurrence.
/// `start`/`end` include the schedule's paddings; overlap during allocation
/// is tested on the padded interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub schedule_id: i32,
    pub rule_id: Option<i32>,
    pub channel_id: i32,
    /// Backing guide program, when the occurrence came from one.
    pub program_id: Option<i32>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Unpadded program start; used as the conflict record key.
    pub program_start: DateTime<Utc>,
    pub priority: SchedulePriority,
    pub series: bool,
}

impl Booking {
    pub fn overlaps(&self, other: &Booking) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// A recorded inability to serve one booking, with the winner it lost to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: i32,
    /// The losing schedule.
    pub schedule_id: i32,
    /// The schedule whose booking kept the resources; `0` when no active
    /// recording was to blame (the channel was not receivable at all).
    pub conflicting_schedule_id: i32,
    /// Card the winner held, `0` for winnerless conflicts.
    pub card_id: i32,
    pub channel_id: i32,
    pub program_start: DateTime<Utc>,
}

/// Flags describing how a guide program is covered by the current plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingStatus {
    /// Some booking records this program.
    pub scheduled: bool,
    /// The booking comes from a series-type schedule.
    pub series_scheduled: bool,
    /// The booking's schedule was materialized from a rule.
    pub rule_scheduled: bool,
}

impl RecordingStatus {
    pub fn is_none(&self) -> bool {
        !self.scheduled && !self.series_scheduled && !self.rule_scheduled
    }

    pub fn merge(&mut self, other: RecordingStatus) {
        self.scheduled |= other.scheduled;
        self.series_scheduled |= other.series_scheduled;
        self.rule_scheduled |= other.rule_scheduled;
    }
}

/// Result of a full allocation pass over the planning horizon.
#[derive(Debug, Clone, Default)]
pub struct RecordingPlan {
    /// Accepted bookings per card id.
    pub assignments: HashMap<i32, Vec<Booking>>,
    pub conflicts: Vec<Conflict>,
    /// Status per program id, for every program touched by a booking.
    pub statuses: HashMap<i32, RecordingStatus>,
}

impl RecordingPlan {
    /// Every accepted booking, across all cards.
    pub fn accepted(&self) -> impl Iterator<Item = &Booking> {
        self.assignments.values().flatten()
    }

    /// Schedule ids with at least one accepted booking.
    pub fn accepted_schedule_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.accepted().map(|b| b.schedule_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
