//! Program-to-intent matching.
//!
//! [`time_window`] decides whether a guide program falls inside a schedule's
//! repeating window and derives the per-occurrence cancellation key.
//! [`rule_filter`] evaluates search-rule criteria against program metadata.

pub mod rule_filter;
pub mod time_window;

pub use rule_filter::{rule_covers, target_matches};
pub use time_window::{
    adjusted_range, is_weekend, is_working_day, occurrence, occurrence_key, schedule_covers,
    window_matches,
};
