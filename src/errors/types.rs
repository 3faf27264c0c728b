//! Error type definitions for the recording scheduler
//!
//! A provider failure aborts the operation that triggered it as a single
//! aggregate error; no partially applied plan is ever committed. Allocation
//! failure is not an error at all, it is the input to conflict resolution.

use thiserror::Error;

/// Top-level engine error type
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Collaborator failures (guide, directory, tuner, library, store)
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Schedule lookups against the store
    #[error("Schedule not found: {id}")]
    ScheduleNotFound { id: i32 },

    /// Rule lookups against the store
    #[error("Schedule rule not found: {id}")]
    RuleNotFound { id: i32 },

    /// Channel lookups against the directory
    #[error("Channel not found: {id}")]
    ChannelNotFound { id: i32 },

    /// Validation of schedules and rules before they reach the store
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl SchedulerError {
    pub fn validation(message: impl Into<String>) -> Self {
        SchedulerError::Validation { message: message.into() }
    }
}

/// Errors raised by collaborator implementations
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The backing service could not be reached or answered abnormally
    #[error("Backend unavailable: {message}")]
    Unavailable { message: String },

    /// A referenced entity does not exist on the provider side
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// The provider rejected a write
    #[error("Store rejected operation: {operation} - {message}")]
    Rejected { operation: String, message: String },
}

impl ProviderError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        ProviderError::Unavailable { message: message.into() }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        ProviderError::NotFound { resource: resource.into(), id: id.to_string() }
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Rejected { operation: operation.into(), message: message.into() }
    }
}
