//! Recording scheduler and tuner allocation engine for DVB TV backends.
//!
//! The crate turns stored recording intents (one-off and repeating
//! schedules, criteria-based search rules) into a concrete recording plan:
//! guide programs matched over a planning horizon, de-duplicated per series
//! episode, assigned to tuner cards under transponder and decryption
//! constraints, with priority-resolved conflicts for everything that does
//! not fit. All external state arrives through the provider traits in
//! [`providers`]; [`scheduler::SchedulerEngine`] is the entry point and
//! [`scheduler::RecheckService`] keeps the plan fresh in the background.

pub mod allocation;
pub mod config;
pub mod conflicts;
pub mod episodes;
pub mod errors;
pub mod expansion;
pub mod matching;
pub mod models;
pub mod providers;
pub mod scheduler;

pub use config::{EpisodeManagementScheme, GenreMap, MovedProgramsConfig, SchedulerSettings};
pub use errors::{ProviderError, ProviderResult, SchedulerError, SchedulerResult};
pub use scheduler::{RecheckService, ScheduleRequest, SchedulerEngine};
