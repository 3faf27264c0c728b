//! The scheduling engine: the mutable heart of the crate.
//!
//! `SchedulerEngine` owns the plan cache and is the only writer of derived
//! state (cancellations from episode management, schedules materialized
//! from rules, the persisted conflict set). Every public operation works
//! over provider snapshots fetched at call time; the allocator never
//! outlives a single plan rebuild.

pub mod service;

pub use service::RecheckService;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::allocation::TuningTable;
use crate::config::{EpisodeManagementScheme, SchedulerSettings};
use crate::conflicts;
use crate::errors::{ProviderError, SchedulerError, SchedulerResult};
use crate::expansion::{series_groups, Expander};
use crate::matching::{occurrence, schedule_covers};
use crate::models::{
    Booking, CancelledInstance, Conflict, KeepMethod, Program, RecordingPlan, RecordingStatus,
    RecordingType, RuleRecordingType, Schedule, SchedulePriority, ScheduleRule, ScheduleUpdate,
};
use crate::providers::{
    ChannelDirectory, MediaLibrary, ProgramGuide, ScheduleStore, TunerProvider,
};

/// Everything needed to create a schedule in one call.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub channel_id: i32,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recording_type: RecordingType,
    pub pre_padding: Duration,
    pub post_padding: Duration,
    pub priority: SchedulePriority,
    pub keep_method: KeepMethod,
    pub keep_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct PlanState {
    plan: Option<RecordingPlan>,
    stale: bool,
}

/// Outcome of one expansion pass over every stored schedule.
struct Expansion {
    bookings: Vec<Booking>,
    /// Candidates rejected by episode management, with their schedule id.
    rejected: Vec<(i32, Program)>,
}

pub struct SchedulerEngine {
    guide: Arc<dyn ProgramGuide>,
    directory: Arc<dyn ChannelDirectory>,
    tuner: Arc<dyn TunerProvider>,
    store: Arc<dyn ScheduleStore>,
    expander: Expander,
    settings: SchedulerSettings,
    /// Start-of-service instant; expansion never looks further back.
    started_at: DateTime<Utc>,
    state: RwLock<PlanState>,
}

impl SchedulerEngine {
    pub fn new(
        guide: Arc<dyn ProgramGuide>,
        directory: Arc<dyn ChannelDirectory>,
        tuner: Arc<dyn TunerProvider>,
        library: Arc<dyn MediaLibrary>,
        store: Arc<dyn ScheduleStore>,
        settings: SchedulerSettings,
        started_at: DateTime<Utc>,
    ) -> SchedulerResult<Self> {
        settings.validate()?;
        let expander = Expander::new(guide.clone(), directory.clone(), library);
        Ok(Self {
            guide,
            directory,
            tuner,
            store,
            expander,
            settings,
            started_at,
            state: RwLock::new(PlanState::default()),
        })
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    fn floor(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn horizon_end(&self, asof: DateTime<Utc>) -> DateTime<Utc> {
        asof + Duration::days(i64::from(self.settings.horizon_days))
    }

    async fn mark_stale(&self) {
        self.state.write().await.stale = true;
    }

    // ------------------------------------------------------------------
    // Schedule operations
    // ------------------------------------------------------------------

    /// Creates a schedule targeting one guide program.
    pub async fn create_schedule_for_program(
        &self,
        program_id: i32,
        recording_type: RecordingType,
    ) -> SchedulerResult<Schedule> {
        let program = self
            .guide
            .program(program_id)
            .await?
            .ok_or_else(|| ProviderError::not_found("program", program_id))?;
        self.create_schedule(ScheduleRequest {
            channel_id: program.channel_id,
            name: program.title,
            start: program.start,
            end: program.end,
            recording_type,
            pre_padding: Duration::zero(),
            post_padding: Duration::zero(),
            priority: SchedulePriority::Normal,
            keep_method: KeepMethod::UntilSpaceNeeded,
            keep_date: None,
        })
        .await
    }

    /// Creates a one-off recording for a bare time window, without a guide
    /// program behind it. The marker title makes removal find it again.
    pub async fn create_schedule_by_time(
        &self,
        channel_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SchedulerResult<Schedule> {
        let channel = self
            .directory
            .channel(channel_id)
            .await?
            .ok_or(SchedulerError::ChannelNotFound { id: channel_id })?;
        self.create_schedule(ScheduleRequest {
            channel_id,
            name: Schedule::manual_title(&channel.name),
            start,
            end,
            recording_type: RecordingType::Once,
            pre_padding: Duration::zero(),
            post_padding: Duration::zero(),
            priority: SchedulePriority::Normal,
            keep_method: KeepMethod::UntilSpaceNeeded,
            keep_date: None,
        })
        .await
    }

    /// Creates a schedule with every field spelled out.
    pub async fn create_schedule(&self, request: ScheduleRequest) -> SchedulerResult<Schedule> {
        if self.directory.channel(request.channel_id).await?.is_none() {
            return Err(SchedulerError::ChannelNotFound { id: request.channel_id });
        }
        let stored = self
            .store
            .create_schedule(Schedule {
                id: 0,
                channel_id: request.channel_id,
                name: request.name,
                start: request.start,
                end: request.end,
                recording_type: request.recording_type,
                pre_padding: request.pre_padding,
                post_padding: request.post_padding,
                priority: request.priority,
                keep_method: request.keep_method,
                keep_date: request.keep_date,
                rule_id: None,
            })
            .await?;
        debug!(schedule_id = stored.id, name = %stored.name, "created schedule");
        self.mark_stale().await;
        Ok(stored)
    }

    /// Applies a partial update to a stored schedule.
    pub async fn edit_schedule(
        &self,
        schedule_id: i32,
        update: ScheduleUpdate,
    ) -> SchedulerResult<Schedule> {
        let mut schedule = self
            .store
            .schedule(schedule_id)
            .await?
            .ok_or(SchedulerError::ScheduleNotFound { id: schedule_id })?;
        if let Some(channel_id) = update.channel_id {
            if self.directory.channel(channel_id).await?.is_none() {
                return Err(SchedulerError::ChannelNotFound { id: channel_id });
            }
            schedule.channel_id = channel_id;
        }
        if let Some(name) = update.name {
            schedule.name = name;
        }
        if let Some(start) = update.start {
            schedule.start = start;
        }
        if let Some(end) = update.end {
            schedule.end = end;
        }
        if let Some(recording_type) = update.recording_type {
            schedule.recording_type = recording_type;
        }
        if let Some(pre) = update.pre_padding {
            schedule.pre_padding = pre;
        }
        if let Some(post) = update.post_padding {
            schedule.post_padding = post;
        }
        if let Some(priority) = update.priority {
            schedule.priority = priority;
        }
        let stored = self.store.update_schedule(schedule).await?;
        self.mark_stale().await;
        Ok(stored)
    }

    pub async fn remove_schedule(&self, schedule_id: i32) -> SchedulerResult<()> {
        if self.store.schedule(schedule_id).await?.is_none() {
            return Err(SchedulerError::ScheduleNotFound { id: schedule_id });
        }
        self.store.delete_schedule(schedule_id).await?;
        self.mark_stale().await;
        Ok(())
    }

    /// Stops every schedule from recording one guide program.
    ///
    /// One-off schedules covering the program are deleted outright; series
    /// schedules get a [`CancelledInstance`] for just that occurrence. For
    /// manual recordings no guide match exists, so coverage falls back to
    /// three overlap cases: the program starts inside the recording window,
    /// ends inside it, or lies entirely within it.
    pub async fn remove_schedule_for_program(&self, program_id: i32) -> SchedulerResult<()> {
        let program = self
            .guide
            .program(program_id)
            .await?
            .ok_or_else(|| ProviderError::not_found("program", program_id))?;
        let mut changed = false;
        for schedule in self.store.schedules().await? {
            let covered = if schedule.is_manual() {
                schedule.channel_id == program.channel_id
                    && manual_window_covers(&schedule, &program)
            } else {
                schedule_covers(&schedule, &program)
            };
            if !covered {
                continue;
            }
            if schedule.recording_type == RecordingType::Once {
                self.store.delete_schedule(schedule.id).await?;
            } else if let Some(instance) = occurrence(&schedule, &program) {
                self.store.add_cancelled_instance(instance).await?;
            }
            changed = true;
        }
        if changed {
            self.mark_stale().await;
        }
        Ok(())
    }

    /// Lifts a per-occurrence cancellation again.
    pub async fn uncancel_occurrence(
        &self,
        channel_id: i32,
        start: DateTime<Utc>,
    ) -> SchedulerResult<()> {
        self.store
            .remove_cancelled_instance(CancelledInstance { channel_id, start })
            .await?;
        self.mark_stale().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rule operations
    // ------------------------------------------------------------------

    pub async fn create_rule(&self, rule: ScheduleRule) -> SchedulerResult<ScheduleRule> {
        validate_rule(&rule)?;
        let stored = self.store.create_rule(rule).await?;
        debug!(rule_id = stored.id, name = %stored.name, "created rule");
        self.mark_stale().await;
        Ok(stored)
    }

    pub async fn edit_rule(&self, rule: ScheduleRule) -> SchedulerResult<ScheduleRule> {
        validate_rule(&rule)?;
        if self.store.rule(rule.id).await?.is_none() {
            return Err(SchedulerError::RuleNotFound { id: rule.id });
        }
        let stored = self.store.update_rule(rule).await?;
        self.mark_stale().await;
        Ok(stored)
    }

    /// Removes a rule together with the schedules it materialized.
    pub async fn remove_rule(&self, rule_id: i32) -> SchedulerResult<()> {
        if self.store.rule(rule_id).await?.is_none() {
            return Err(SchedulerError::RuleNotFound { id: rule_id });
        }
        for schedule in self.store.schedules().await? {
            if schedule.rule_id == Some(rule_id) {
                self.store.delete_schedule(schedule.id).await?;
            }
        }
        self.store.delete_rule(rule_id).await?;
        self.mark_stale().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The programs one schedule will record, episode management applied.
    /// Pure: no cancellations are written, no rules materialized.
    pub async fn programs_for_schedule(&self, schedule_id: i32) -> SchedulerResult<Vec<Program>> {
        let schedule = self
            .store
            .schedule(schedule_id)
            .await?
            .ok_or(SchedulerError::ScheduleNotFound { id: schedule_id })?;
        let cancelled: HashSet<CancelledInstance> =
            self.store.cancelled_instances().await?.into_iter().collect();
        let floor = self.floor();
        let until = self.horizon_end(floor);

        if !schedule.is_series() {
            return self
                .expander
                .schedule_candidates(&schedule, floor, until, &cancelled)
                .await;
        }

        // Series schedules share one episode pass with every sibling of the
        // same series, so the answer matches what a plan rebuild would book.
        let schedules = self.store.schedules().await?;
        let siblings: Vec<&Schedule> = schedules
            .iter()
            .filter(|s| s.is_series() && s.name == schedule.name)
            .collect();
        let mut entries = Vec::new();
        for sibling in &siblings {
            for program in self
                .expander
                .schedule_candidates(sibling, floor, until, &cancelled)
                .await?
            {
                entries.push((sibling.id, program));
            }
        }
        let pass = self
            .expander
            .series_pass(
                &schedule.name,
                entries,
                self.settings.episode_management,
                self.settings.episode_info_regex.as_deref(),
            )
            .await?;
        let mut programs: Vec<Program> = pass
            .into_iter()
            .filter(|c| c.schedule_id == schedule_id && c.is_accepted())
            .map(|c| c.program)
            .collect();
        programs.sort_by_key(|p| (p.start, p.id));
        Ok(programs)
    }

    /// The programs a rule would record right now. Pure: nothing is
    /// materialized and `Once` rules stay active.
    pub async fn programs_for_rule(&self, rule_id: i32) -> SchedulerResult<Vec<Program>> {
        let rule = self
            .store
            .rule(rule_id)
            .await?
            .ok_or(SchedulerError::RuleNotFound { id: rule_id })?;
        let floor = self.floor();
        let archive = self.archive_titles().await?;
        self.expander
            .expand_rule(
                &rule,
                Utc::now(),
                floor,
                self.horizon_end(floor),
                self.settings.episode_management,
                &archive,
            )
            .await
    }

    /// Schedules with at least one accepted booking starting within the
    /// next `days` days.
    pub async fn recorded_schedules(&self, days: u32) -> SchedulerResult<Vec<Schedule>> {
        let plan = self.plan().await?;
        let cutoff = self.floor() + Duration::days(i64::from(days));
        let mut ids: Vec<i32> = plan
            .accepted()
            .filter(|b| b.start < cutoff)
            .map(|b| b.schedule_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let mut schedules = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(schedule) = self.store.schedule(id).await? {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }

    /// The winning programs `schedule_id` lost occurrences against.
    pub async fn conflicts_for_schedule(&self, schedule_id: i32) -> SchedulerResult<Vec<Program>> {
        let plan = self.plan().await?;
        self.winning_programs(&plan, |c| c.schedule_id == schedule_id)
            .await
    }

    /// The winning programs any schedule of `rule_id` lost against.
    pub async fn conflicts_for_rule(&self, rule_id: i32) -> SchedulerResult<Vec<Program>> {
        // Build the plan first; it materializes the rule's schedules.
        let plan = self.plan().await?;
        let losers: HashSet<i32> = self
            .store
            .schedules()
            .await?
            .into_iter()
            .filter(|s| s.rule_id == Some(rule_id))
            .map(|s| s.id)
            .collect();
        self.winning_programs(&plan, |c| losers.contains(&c.schedule_id))
            .await
    }

    async fn winning_programs<F>(
        &self,
        plan: &RecordingPlan,
        mut is_loss: F,
    ) -> SchedulerResult<Vec<Program>>
    where
        F: FnMut(&Conflict) -> bool,
    {
        let mut programs: Vec<Program> = Vec::new();
        let mut seen = HashSet::new();
        for conflict in plan.conflicts.iter().filter(|c| is_loss(c)) {
            // The winner occurrence closest to the lost one.
            let winner = plan
                .accepted()
                .filter(|b| b.schedule_id == conflict.conflicting_schedule_id)
                .min_by_key(|b| (b.start - conflict.program_start).abs());
            let Some(program_id) = winner.and_then(|b| b.program_id) else {
                continue;
            };
            if !seen.insert(program_id) {
                continue;
            }
            if let Some(program) = self.guide.program(program_id).await? {
                programs.push(program);
            }
        }
        programs.sort_by_key(|p| (p.start, p.id));
        Ok(programs)
    }

    /// Recording flags for one program under the current plan.
    pub async fn recording_status(&self, program_id: i32) -> SchedulerResult<RecordingStatus> {
        let plan = self.plan().await?;
        Ok(plan.statuses.get(&program_id).copied().unwrap_or_default())
    }

    /// Guide passthrough with genre classification and recording flags.
    pub async fn programs_with_status(
        &self,
        channel_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SchedulerResult<Vec<(Program, RecordingStatus)>> {
        let plan = self.plan().await?;
        let programs = self.guide.programs(channel_id, from, to).await?;
        Ok(programs
            .into_iter()
            .map(|mut program| {
                if program.epg_genre.is_none() {
                    program.epg_genre = self.settings.genre_map.classify(&program.genre);
                }
                let status = plan.statuses.get(&program.id).copied().unwrap_or_default();
                (program, status)
            })
            .collect())
    }

    /// The current plan, rebuilding it first when stale.
    pub async fn plan(&self) -> SchedulerResult<RecordingPlan> {
        {
            let state = self.state.read().await;
            if !state.stale {
                if let Some(plan) = &state.plan {
                    return Ok(plan.clone());
                }
            }
        }
        let mut state = self.state.write().await;
        if state.stale || state.plan.is_none() {
            let plan = self.rebuild_plan(Utc::now().max(self.floor())).await?;
            state.plan = Some(plan);
            state.stale = false;
        }
        Ok(state.plan.clone().unwrap_or_default())
    }

    pub async fn conflicts(&self) -> SchedulerResult<Vec<Conflict>> {
        Ok(self.plan().await?.conflicts)
    }

    // ------------------------------------------------------------------
    // Recheck
    // ------------------------------------------------------------------

    /// One maintenance cycle: drift detection, rule materialization,
    /// episode-management cancellations, then a plan rebuild if anything
    /// changed (or no plan exists yet).
    pub async fn recheck(&self, now: DateTime<Utc>) -> SchedulerResult<()> {
        self.run_recheck(now, false).await
    }

    /// Like [`recheck`](Self::recheck) but always rebuilds the plan.
    pub async fn recheck_full(&self, now: DateTime<Utc>) -> SchedulerResult<()> {
        self.run_recheck(now, true).await
    }

    async fn run_recheck(&self, now: DateTime<Utc>, force: bool) -> SchedulerResult<()> {
        let run_id = Uuid::new_v4();
        info!(%run_id, %now, "recheck started");

        let mut changed = false;
        if self.settings.moved_programs.detect {
            changed |= self.detect_moved_programs(now, run_id).await?;
        }
        changed |= self.materialize_rules(now).await?;
        changed |= self.retire_rejected_occurrences(now).await?;

        let mut state = self.state.write().await;
        if force || changed || state.stale || state.plan.is_none() {
            let plan = self.rebuild_plan(now).await?;
            info!(
                %run_id,
                bookings = plan.accepted().count(),
                conflicts = plan.conflicts.len(),
                "recheck rebuilt plan"
            );
            state.plan = Some(plan);
            state.stale = false;
        } else {
            debug!(%run_id, "recheck found nothing to do");
        }
        Ok(())
    }

    /// Re-targets one-off schedules whose guide program drifted. Returns
    /// whether any schedule was replaced.
    async fn detect_moved_programs(
        &self,
        now: DateTime<Utc>,
        run_id: Uuid,
    ) -> SchedulerResult<bool> {
        let window = minutes(self.settings.moved_programs.window_min);
        let offset = minutes(self.settings.moved_programs.offset_min);
        let mut changed = false;

        for schedule in self.store.schedules().await? {
            if schedule.recording_type != RecordingType::Once || schedule.is_manual() {
                continue;
            }
            // Detection arms shortly before the recording would begin.
            if now + offset < schedule.start || schedule.end <= now {
                continue;
            }
            let programs = self
                .guide
                .programs(
                    schedule.channel_id,
                    schedule.start - window,
                    schedule.start + window + schedule.duration(),
                )
                .await?;
            let exact_exists = programs.iter().any(|p| {
                p.title == schedule.name && p.start == schedule.start && p.end == schedule.end
            });
            if exact_exists {
                continue;
            }
            let moved = programs
                .iter()
                .filter(|p| {
                    p.title == schedule.name && (p.start - schedule.start).abs() <= window
                })
                .min_by_key(|p| (p.start - schedule.start).abs());
            let Some(target) = moved else {
                continue;
            };
            info!(
                %run_id,
                schedule_id = schedule.id,
                name = %schedule.name,
                old_start = %schedule.start,
                new_start = %target.start,
                "re-targeting moved program"
            );
            self.store.delete_schedule(schedule.id).await?;
            self.store
                .create_schedule(Schedule {
                    id: 0,
                    start: target.start,
                    end: target.end,
                    ..schedule
                })
                .await?;
            changed = true;
        }
        Ok(changed)
    }

    /// Materializes every active rule's matches into one-off schedules,
    /// deduplicated against what is already stored. Returns whether any
    /// schedule or rule was written.
    async fn materialize_rules(&self, now: DateTime<Utc>) -> SchedulerResult<bool> {
        let rules = self.store.rules().await?;
        if rules.is_empty() {
            return Ok(false);
        }
        let archive = self.archive_titles().await?;
        let floor = self.floor();
        let until = self.horizon_end(now.max(floor));
        let mut existing: HashSet<(i32, String, DateTime<Utc>, DateTime<Utc>)> = self
            .store
            .schedules()
            .await?
            .into_iter()
            .map(|s| (s.channel_id, s.name, s.start, s.end))
            .collect();

        let mut changed = false;
        for rule in rules {
            if !rule.is_active_at(now) {
                continue;
            }
            let matches = self
                .expander
                .expand_rule(
                    &rule,
                    now,
                    floor,
                    until,
                    self.settings.episode_management,
                    &archive,
                )
                .await?;
            let mut booked_any = false;
            for program in &matches {
                booked_any = true;
                let key = (
                    program.channel_id,
                    program.title.clone(),
                    program.start,
                    program.end,
                );
                if existing.contains(&key) {
                    continue;
                }
                self.store
                    .create_schedule(Schedule {
                        id: 0,
                        channel_id: program.channel_id,
                        name: program.title.clone(),
                        start: program.start,
                        end: program.end,
                        recording_type: RecordingType::Once,
                        pre_padding: rule.pre_padding,
                        post_padding: rule.post_padding,
                        priority: rule.priority,
                        keep_method: rule.keep_method,
                        keep_date: rule.keep_date,
                        rule_id: Some(rule.id),
                    })
                    .await?;
                existing.insert(key);
                changed = true;
            }
            if booked_any && rule.recording_type == RuleRecordingType::Once {
                let mut done = rule;
                done.active = false;
                self.store.update_rule(done).await?;
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Writes a [`CancelledInstance`] for every occurrence episode
    /// management rejected, as long as the program has not ended and the
    /// occurrence is not cancelled already. Returns whether anything was
    /// written.
    async fn retire_rejected_occurrences(&self, now: DateTime<Utc>) -> SchedulerResult<bool> {
        if self.settings.episode_management == EpisodeManagementScheme::None {
            return Ok(false);
        }
        let schedules = self.store.schedules().await?;
        let by_id: HashMap<i32, &Schedule> = schedules.iter().map(|s| (s.id, s)).collect();
        let cancelled: HashSet<CancelledInstance> =
            self.store.cancelled_instances().await?.into_iter().collect();
        let expansion = self.expand_schedules(&schedules, &cancelled, now).await?;

        let mut changed = false;
        for (schedule_id, program) in expansion.rejected {
            if program.end <= now {
                continue;
            }
            let Some(schedule) = by_id.get(&schedule_id) else {
                continue;
            };
            let Some(instance) = occurrence(schedule, &program) else {
                continue;
            };
            if cancelled.contains(&instance) {
                continue;
            }
            debug!(
                schedule_id,
                program_id = program.id,
                start = %instance.start,
                "retiring occurrence rejected by episode management"
            );
            self.store.add_cancelled_instance(instance).await?;
            changed = true;
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Plan building
    // ------------------------------------------------------------------

    async fn rebuild_plan(&self, now: DateTime<Utc>) -> SchedulerResult<RecordingPlan> {
        // Rules must be materialized before expansion or their bookings
        // would be invisible to the first plan after startup.
        self.materialize_rules(now).await?;

        let schedules = self.store.schedules().await?;
        let cancelled: HashSet<CancelledInstance> =
            self.store.cancelled_instances().await?.into_iter().collect();
        let expansion = self.expand_schedules(&schedules, &cancelled, now).await?;

        let cards = self.tuner.cards().await?;
        let tunings = self.tuning_table(&cards, &expansion.bookings).await?;

        let mut statuses: HashMap<i32, RecordingStatus> = HashMap::new();
        for booking in &expansion.bookings {
            if let Some(program_id) = booking.program_id {
                statuses.entry(program_id).or_default().merge(RecordingStatus {
                    scheduled: true,
                    series_scheduled: booking.series,
                    rule_scheduled: booking.rule_id.is_some(),
                });
            }
        }

        let resolution = conflicts::resolve(expansion.bookings, &cards, &tunings);
        self.store.replace_conflicts(resolution.conflicts.clone()).await?;

        Ok(RecordingPlan {
            assignments: resolution.assignments,
            conflicts: resolution.conflicts,
            statuses,
        })
    }

    /// Expands every stored schedule into bookings, running one shared
    /// episode pass per series.
    async fn expand_schedules(
        &self,
        schedules: &[Schedule],
        cancelled: &HashSet<CancelledInstance>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<Expansion> {
        let floor = self.floor();
        let until = self.horizon_end(now.max(floor));
        let by_id: HashMap<i32, &Schedule> = schedules.iter().map(|s| (s.id, s)).collect();

        let mut accepted: Vec<(i32, Program)> = Vec::new();
        let mut rejected: Vec<(i32, Program)> = Vec::new();
        let mut bookings: Vec<Booking> = Vec::new();

        for schedule in schedules {
            if schedule.is_manual() {
                bookings.push(manual_booking(schedule));
            } else if !schedule.is_series() {
                for program in self
                    .expander
                    .schedule_candidates(schedule, floor, until, cancelled)
                    .await?
                {
                    accepted.push((schedule.id, program));
                }
            }
        }

        for (series, members) in series_groups(schedules) {
            let mut entries = Vec::new();
            for member in &members {
                if member.is_manual() {
                    continue;
                }
                for program in self
                    .expander
                    .schedule_candidates(member, floor, until, cancelled)
                    .await?
                {
                    entries.push((member.id, program));
                }
            }
            let pass = self
                .expander
                .series_pass(
                    &series,
                    entries,
                    self.settings.episode_management,
                    self.settings.episode_info_regex.as_deref(),
                )
                .await?;
            for candidate in pass {
                if candidate.is_accepted() {
                    accepted.push((candidate.schedule_id, candidate.program));
                } else {
                    rejected.push((candidate.schedule_id, candidate.program));
                }
            }
        }

        for (schedule_id, program) in accepted {
            let Some(schedule) = by_id.get(&schedule_id) else {
                continue;
            };
            bookings.push(Booking {
                schedule_id,
                rule_id: schedule.rule_id,
                channel_id: program.channel_id,
                program_id: Some(program.id),
                title: program.title.clone(),
                start: program.start - schedule.pre_padding,
                end: program.end + schedule.post_padding,
                program_start: program.start,
                priority: schedule.priority,
                series: schedule.is_series(),
            });
        }

        Ok(Expansion { bookings, rejected })
    }

    /// Tuning details for every `(card, channel)` pair the bookings touch.
    async fn tuning_table(
        &self,
        cards: &[crate::models::Card],
        bookings: &[Booking],
    ) -> SchedulerResult<TuningTable> {
        let channel_ids: HashSet<i32> = bookings.iter().map(|b| b.channel_id).collect();
        let mut table = TuningTable::new();
        for card in cards {
            for &channel_id in &channel_ids {
                if let Some(detail) = self.tuner.tuning_detail(card.id, channel_id).await? {
                    table.insert(card.id, detail);
                }
            }
        }
        Ok(table)
    }

    async fn archive_titles(&self) -> SchedulerResult<HashSet<String>> {
        self.expander.archived_titles().await
    }
}

/// The manual-removal overlap test: the program starts inside the recording
/// window, ends inside it, or lies entirely within it.
fn manual_window_covers(schedule: &Schedule, program: &Program) -> bool {
    let starts_inside = program.start >= schedule.start && program.start < schedule.end;
    let ends_inside = program.end > schedule.start && program.end <= schedule.end;
    let contained = program.start >= schedule.start && program.end <= schedule.end;
    starts_inside || ends_inside || contained
}

fn manual_booking(schedule: &Schedule) -> Booking {
    Booking {
        schedule_id: schedule.id,
        rule_id: schedule.rule_id,
        channel_id: schedule.channel_id,
        program_id: None,
        title: schedule.name.clone(),
        start: schedule.start - schedule.pre_padding,
        end: schedule.end + schedule.post_padding,
        program_start: schedule.start,
        priority: schedule.priority,
        series: false,
    }
}

fn validate_rule(rule: &ScheduleRule) -> SchedulerResult<()> {
    if rule.name.trim().is_empty() {
        return Err(SchedulerError::validation("rule name must not be empty"));
    }
    if rule.targets.is_empty() && rule.series_name.is_none() {
        return Err(SchedulerError::validation(
            "rule needs at least one search target or a series name",
        ));
    }
    if rule.window_start.is_some() != rule.window_end.is_some() {
        return Err(SchedulerError::validation(
            "rule time window needs both a start and an end",
        ));
    }
    Ok(())
}

fn minutes(value: f64) -> Duration {
    Duration::seconds((value * 60.0) as i64)
}
