//! Repeating-window evaluation.
//!
//! A schedule's `start`/`end` pair is the window of its first occurrence;
//! for repeating types only the time-of-day (and, for weekly types, the
//! weekday) carries meaning. Matching re-anchors the window on the candidate
//! program's own date and additionally tries the adjacent days, so windows
//! that cross midnight catch programs on either side of the boundary.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

use crate::models::{CancelledInstance, Program, RecordingType, Schedule};

fn anchor(date: NaiveDate, days: i64, time: NaiveTime) -> DateTime<Utc> {
    (date + Duration::days(days)).and_time(time).and_utc()
}

/// Whether `program` overlaps the repeating window described by
/// `window_start`/`window_end`, re-anchored on the program's date.
///
/// The window is tried at day offsets `0`, `+1` and `-1`; a window whose end
/// falls on the day after its start carries that extra day through each
/// trial.
pub fn window_matches(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    program: &Program,
) -> bool {
    let midnight_carry = i64::from(window_start.date_naive() != window_end.date_naive());
    let date = program.start.date_naive();
    [0i64, 1, -1].into_iter().any(|day| {
        program.start < anchor(date, midnight_carry + day, window_end.time())
            && program.end > anchor(date, day, window_start.time())
    })
}

/// The concrete occurrence window of a repeating schedule around `program`.
///
/// Starting one day before the program, the schedule's window (same
/// time-of-day, same duration) slides forward a day at a time for three
/// trials; the first trial overlapping the program is the occurrence. The
/// returned start doubles as the occurrence's cancellation key. `None` means
/// the program lies outside all three trials.
pub fn adjusted_range(
    schedule_start: DateTime<Utc>,
    schedule_end: DateTime<Utc>,
    program: &Program,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let duration = schedule_end - schedule_start;
    let mut start = anchor(program.start.date_naive(), -1, schedule_start.time());
    for _ in 0..3 {
        let end = start + duration;
        if program.start < end && program.end > start {
            return Some((start, end));
        }
        start += Duration::days(1);
    }
    None
}

pub fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

pub fn is_working_day(day: Weekday) -> bool {
    !is_weekend(day)
}

/// Whether `schedule` targets `program`, per the schedule's recording type.
/// Cancellations and pastness are the caller's concern.
pub fn schedule_covers(schedule: &Schedule, program: &Program) -> bool {
    let same_channel = program.channel_id == schedule.channel_id;
    let same_title = program.title == schedule.name;
    match schedule.recording_type {
        RecordingType::Once => {
            same_channel
                && same_title
                && program.start == schedule.start
                && program.end == schedule.end
        }
        RecordingType::Daily => {
            same_channel && window_matches(schedule.start, schedule.end, program)
        }
        RecordingType::Weekly => {
            same_channel
                && program.start.weekday() == schedule.start.weekday()
                && window_matches(schedule.start, schedule.end, program)
        }
        RecordingType::Weekends => {
            same_channel
                && is_weekend(program.start.weekday())
                && window_matches(schedule.start, schedule.end, program)
        }
        RecordingType::WorkingDays => {
            same_channel
                && is_working_day(program.start.weekday())
                && window_matches(schedule.start, schedule.end, program)
        }
        RecordingType::EveryTimeOnThisChannel => same_channel && same_title,
        RecordingType::EveryTimeOnEveryChannel => same_title,
        RecordingType::WeeklyEveryTimeOnThisChannel => {
            same_channel && same_title && program.start.weekday() == schedule.start.weekday()
        }
    }
}

/// The cancellation key identifying one occurrence of `schedule` at
/// `program`. One-off schedules key on their own start, windowed types on
/// the adjusted window start, title-driven types on the program start.
pub fn occurrence_key(schedule: &Schedule, program: &Program) -> Option<DateTime<Utc>> {
    match schedule.recording_type {
        RecordingType::Once => Some(schedule.start),
        RecordingType::Daily
        | RecordingType::Weekly
        | RecordingType::Weekends
        | RecordingType::WorkingDays => {
            adjusted_range(schedule.start, schedule.end, program).map(|(start, _)| start)
        }
        RecordingType::EveryTimeOnThisChannel
        | RecordingType::EveryTimeOnEveryChannel
        | RecordingType::WeeklyEveryTimeOnThisChannel => Some(program.start),
    }
}

/// The [`CancelledInstance`] that would skip this occurrence.
pub fn occurrence(schedule: &Schedule, program: &Program) -> Option<CancelledInstance> {
    occurrence_key(schedule, program).map(|start| CancelledInstance {
        channel_id: program.channel_id,
        start,
    })
}
