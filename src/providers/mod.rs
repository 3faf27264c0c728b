//! Collaborator traits the engine is constructed over.
//!
//! The engine never reaches into a service locator; every external concern
//! (guide data, channel lineup, tuner hardware, media library, persisted
//! scheduling state) is injected as a trait object at construction time.
//! Implementations are expected to be cheap to clone behind `Arc` and safe
//! to call concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::ProviderResult;
use crate::models::{
    CancelledInstance, Card, Channel, ChannelGroup, Conflict, EpisodeNumber, Program, Recording,
    Schedule, ScheduleRule, TuningDetail,
};

/// Read access to the electronic program guide.
#[async_trait]
pub trait ProgramGuide: Send + Sync {
    /// Programs on one channel overlapping the half-open window `[from, to)`,
    /// ordered by start time.
    async fn programs(
        &self,
        channel_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<Program>>;

    /// Programs whose title matches `title` exactly (case-insensitive),
    /// across all channels, overlapping `[from, to)`.
    async fn programs_by_title(
        &self,
        title: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<Program>>;

    /// Programs on every channel of a group overlapping `[from, to)`.
    async fn programs_for_group(
        &self,
        group_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<Program>>;

    async fn program(&self, program_id: i32) -> ProviderResult<Option<Program>>;
}

/// Channel lineup and grouping.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn groups(&self) -> ProviderResult<Vec<ChannelGroup>>;

    /// Channels of one group in lineup order.
    async fn channels(&self, group_id: i32) -> ProviderResult<Vec<Channel>>;

    async fn channel(&self, channel_id: i32) -> ProviderResult<Option<Channel>>;
}

/// Tuner hardware inventory.
#[async_trait]
pub trait TunerProvider: Send + Sync {
    /// All cards, including disabled ones.
    async fn cards(&self) -> ProviderResult<Vec<Card>>;

    /// The tuning detail for `channel_id` on `card_id`, or `None` when the
    /// card cannot receive that channel.
    async fn tuning_detail(
        &self,
        card_id: i32,
        channel_id: i32,
    ) -> ProviderResult<Option<TuningDetail>>;
}

/// What the household already has on disk.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Episode identities owned for one series, in no particular order.
    async fn owned_episodes(&self, series_title: &str) -> ProviderResult<Vec<EpisodeNumber>>;

    /// Finished recordings kept in the archive.
    async fn archived_recordings(&self) -> ProviderResult<Vec<Recording>>;
}

/// Persistence for schedules, rules, cancellations and conflicts.
///
/// `create_*` methods assign the id; callers pass the entity with any id
/// and receive the stored copy back.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn schedules(&self) -> ProviderResult<Vec<Schedule>>;

    async fn schedule(&self, schedule_id: i32) -> ProviderResult<Option<Schedule>>;

    async fn create_schedule(&self, schedule: Schedule) -> ProviderResult<Schedule>;

    async fn update_schedule(&self, schedule: Schedule) -> ProviderResult<Schedule>;

    async fn delete_schedule(&self, schedule_id: i32) -> ProviderResult<()>;

    async fn cancelled_instances(&self) -> ProviderResult<Vec<CancelledInstance>>;

    async fn add_cancelled_instance(&self, instance: CancelledInstance) -> ProviderResult<()>;

    async fn remove_cancelled_instance(&self, instance: CancelledInstance) -> ProviderResult<()>;

    async fn rules(&self) -> ProviderResult<Vec<ScheduleRule>>;

    async fn rule(&self, rule_id: i32) -> ProviderResult<Option<ScheduleRule>>;

    async fn create_rule(&self, rule: ScheduleRule) -> ProviderResult<ScheduleRule>;

    async fn update_rule(&self, rule: ScheduleRule) -> ProviderResult<ScheduleRule>;

    async fn delete_rule(&self, rule_id: i32) -> ProviderResult<()>;

    /// Replaces the persisted conflict set wholesale. Conflicts are derived
    /// state; each plan rebuild swaps the previous set out atomically.
    async fn replace_conflicts(&self, conflicts: Vec<Conflict>) -> ProviderResult<()>;

    async fn conflicts(&self) -> ProviderResult<Vec<Conflict>>;
}
