//! Schedule and rule expansion: turning stored recording intents into
//! concrete guide program candidates over the planning horizon.
//!
//! Expansion is a read-only view over the guide; cancellation bookkeeping
//! and plan building belong to the engine. Series de-duplication runs as a
//! separate pass over the merged candidates of every schedule sharing a
//! series, so two schedules for the same show never book the same episode
//! twice.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::debug;

use crate::config::EpisodeManagementScheme;
use crate::episodes::{EpisodeDecision, EpisodeIdentityResolver, EpisodeTracker};
use crate::errors::SchedulerResult;
use crate::matching::{occurrence, rule_covers, schedule_covers};
use crate::models::{
    CancelledInstance, EpisodeInfoFallback, EpisodeNumber, Program, RecordingType,
    RuleRecordingType, Schedule, ScheduleRule,
};
use crate::providers::{ChannelDirectory, MediaLibrary, ProgramGuide};

/// One candidate occurrence after a series de-duplication pass.
#[derive(Debug, Clone)]
pub struct SeriesCandidate {
    pub schedule_id: i32,
    pub program: Program,
    pub decision: EpisodeDecision,
}

impl SeriesCandidate {
    pub fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }
}

/// Expands schedules and rules against the live guide.
pub struct Expander {
    guide: Arc<dyn ProgramGuide>,
    directory: Arc<dyn ChannelDirectory>,
    library: Arc<dyn MediaLibrary>,
}

impl Expander {
    pub fn new(
        guide: Arc<dyn ProgramGuide>,
        directory: Arc<dyn ChannelDirectory>,
        library: Arc<dyn MediaLibrary>,
    ) -> Self {
        Self { guide, directory, library }
    }

    /// Guide programs `schedule` would record in `[floor, until)`, before
    /// any series de-duplication. Cancelled occurrences are dropped; the
    /// result is ordered by start time.
    pub async fn schedule_candidates(
        &self,
        schedule: &Schedule,
        floor: DateTime<Utc>,
        until: DateTime<Utc>,
        cancelled: &HashSet<CancelledInstance>,
    ) -> SchedulerResult<Vec<Program>> {
        let fetched = match schedule.recording_type {
            RecordingType::EveryTimeOnEveryChannel => {
                self.guide.programs_by_title(&schedule.name, floor, until).await?
            }
            _ => self.guide.programs(schedule.channel_id, floor, until).await?,
        };

        let mut candidates: Vec<Program> = fetched
            .into_iter()
            .filter(|p| p.end >= floor)
            .filter(|p| schedule_covers(schedule, p))
            .filter(|p| {
                occurrence(schedule, p).is_none_or(|instance| !cancelled.contains(&instance))
            })
            .collect();
        candidates.sort_by_key(|p| (p.start, p.id));
        Ok(candidates)
    }

    /// Runs one episode-management pass over the merged candidates of every
    /// schedule belonging to the same series. Candidates are judged in
    /// airing order regardless of which schedule produced them, so the
    /// earliest airing of an episode wins across schedules.
    pub async fn series_pass(
        &self,
        series_title: &str,
        entries: Vec<(i32, Program)>,
        scheme: EpisodeManagementScheme,
        fallback_pattern: Option<&str>,
    ) -> SchedulerResult<Vec<SeriesCandidate>> {
        let owned = match scheme {
            EpisodeManagementScheme::None => Vec::new(),
            _ => self.library.owned_episodes(series_title).await?,
        };
        Ok(run_episode_pass(entries, scheme, owned, fallback_pattern))
    }

    /// Programs an active rule would record in `[floor, until)`, fully
    /// filtered: scope, criteria, archive skip, episode management and the
    /// rule's recording-type cap.
    pub async fn expand_rule(
        &self,
        rule: &ScheduleRule,
        asof: DateTime<Utc>,
        floor: DateTime<Utc>,
        until: DateTime<Utc>,
        scheme: EpisodeManagementScheme,
        archive_titles: &HashSet<String>,
    ) -> SchedulerResult<Vec<Program>> {
        if !rule.is_active_at(asof) {
            return Ok(Vec::new());
        }

        let mut matches: Vec<Program> = self
            .scoped_catalogue(rule, floor, until)
            .await?
            .into_iter()
            .filter(|p| p.end >= floor)
            .filter(|p| rule_covers(rule, p))
            .filter(|p| !archive_titles.contains(&p.title.to_lowercase()))
            .collect();
        matches.sort_by_key(|p| (p.start, p.id));

        if rule.recording_type == RuleRecordingType::AllOnSameChannel {
            if let Some(channel_id) = matches.first().map(|p| p.channel_id) {
                matches.retain(|p| p.channel_id == channel_id);
            }
        }

        if let Some(series) = &rule.series_name {
            let pattern = match rule.episode_info_fallback {
                EpisodeInfoFallback::DescriptionRegex => rule.episode_info_regex.as_deref(),
                EpisodeInfoFallback::None => None,
            };
            let entries = matches.into_iter().map(|p| (rule.id, p)).collect();
            matches = self
                .series_pass(series, entries, scheme, pattern)
                .await?
                .into_iter()
                .filter(|c| c.is_accepted())
                .map(|c| c.program)
                .collect();
        }

        if rule.recording_type == RuleRecordingType::Once {
            matches.truncate(1);
        }

        debug!(rule_id = rule.id, matches = matches.len(), "expanded rule");
        Ok(matches)
    }

    /// Titles already in the archive, lowercased for the case-insensitive
    /// skip in rule expansion.
    pub async fn archived_titles(&self) -> SchedulerResult<HashSet<String>> {
        Ok(self
            .library
            .archived_recordings()
            .await?
            .into_iter()
            .map(|r| r.title.to_lowercase())
            .collect())
    }

    /// The guide slice a rule searches: one channel, one group, or the whole
    /// lineup. Programs reachable through several groups are deduplicated.
    async fn scoped_catalogue(
        &self,
        rule: &ScheduleRule,
        floor: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> SchedulerResult<Vec<Program>> {
        if let Some(channel_id) = rule.channel_id {
            return Ok(self.guide.programs(channel_id, floor, until).await?);
        }
        if let Some(group_id) = rule.channel_group_id {
            return Ok(self.guide.programs_for_group(group_id, floor, until).await?);
        }

        let groups = self.directory.groups().await?;
        let fetches = groups
            .iter()
            .map(|g| self.guide.programs_for_group(g.id, floor, until));
        let mut seen = HashSet::new();
        let mut programs = Vec::new();
        for batch in try_join_all(fetches).await? {
            for program in batch {
                if seen.insert(program.id) {
                    programs.push(program);
                }
            }
        }
        Ok(programs)
    }
}

/// The synchronous core of a series pass, shared by schedule and rule
/// expansion. `entries` carry the owning schedule or rule id through the
/// pass unchanged.
pub fn run_episode_pass(
    mut entries: Vec<(i32, Program)>,
    scheme: EpisodeManagementScheme,
    owned: Vec<EpisodeNumber>,
    fallback_pattern: Option<&str>,
) -> Vec<SeriesCandidate> {
    entries.sort_by_key(|(owner, p)| (p.start, *owner, p.id));
    let mut resolver = EpisodeIdentityResolver::new();
    let mut tracker = EpisodeTracker::new(scheme, owned);
    entries
        .into_iter()
        .map(|(schedule_id, program)| {
            let identity = resolver.identity_of(&program, fallback_pattern);
            let decision = tracker.admit(identity);
            SeriesCandidate { schedule_id, program, decision }
        })
        .collect()
}

/// Groups series-type schedules by their series title (the schedule name),
/// preserving id order inside each group.
pub fn series_groups(schedules: &[Schedule]) -> HashMap<String, Vec<&Schedule>> {
    let mut groups: HashMap<String, Vec<&Schedule>> = HashMap::new();
    for schedule in schedules {
        if schedule.is_series() {
            groups.entry(schedule.name.clone()).or_default().push(schedule);
        }
    }
    for members in groups.values_mut() {
        members.sort_by_key(|s| s.id);
    }
    groups
}
