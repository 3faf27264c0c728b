//! Centralized error handling for the recording scheduler
//!
//! This module provides the error system shared by all engine layers and the
//! collaborator traits.
//!
//! # Error Categories
//!
//! - **Provider Errors**: guide, channel directory, tuner, media library and
//!   store failures
//! - **Scheduler Errors**: engine operations (lookups, validation, aborted
//!   rechecks)
//!
//! # Usage
//!
//! ```rust
//! use dvr_scheduler::errors::{SchedulerError, SchedulerResult};
//!
//! fn example_function() -> SchedulerResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using SchedulerError
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Convenience type alias for provider Results
pub type ProviderResult<T> = Result<T, ProviderError>;
