//! Shared in-memory backend and guide fixture for the integration suites.
//!
//! One [`Backend`] implements every provider trait over a single piece of
//! mutex-held state, so the engine is wired against the same object five
//! times over. The canned lineup models a small cable head-end: three cards
//! with different capabilities, six channels spread over four transponders
//! and two weeks of guide data starting on a Monday.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use dvr_scheduler::errors::ProviderResult;
use dvr_scheduler::models::{
    CancelledInstance, Card, Channel, ChannelGroup, Conflict, EpisodeInfoFallback, EpisodeNumber,
    KeepMethod, MediaKind, Program, Recording, RecordingType, RuleRecordingType, RuleTarget,
    Schedule, SchedulePriority, ScheduleRule, TuningDetail,
};
use dvr_scheduler::providers::{
    ChannelDirectory, MediaLibrary, ProgramGuide, ScheduleStore, TunerProvider,
};
use dvr_scheduler::{ScheduleRequest, SchedulerEngine, SchedulerSettings};

#[derive(Default)]
struct State {
    groups: Vec<ChannelGroup>,
    channels: Vec<Channel>,
    programs: Vec<Program>,
    cards: Vec<Card>,
    tunings: HashMap<(i32, i32), TuningDetail>,
    schedules: Vec<Schedule>,
    next_schedule_id: i32,
    cancelled: Vec<CancelledInstance>,
    rules: Vec<ScheduleRule>,
    next_rule_id: i32,
    conflicts: Vec<Conflict>,
    /// Owned episodes per lowercased series title.
    owned: HashMap<String, Vec<EpisodeNumber>>,
    recordings: Vec<Recording>,
}

/// In-memory stand-in for every collaborator the engine talks to.
pub struct Backend {
    state: Mutex<State>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_schedule_id: 1,
                next_rule_id: 1,
                ..State::default()
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("backend state poisoned")
    }

    pub fn add_card(&self, id: i32, name: &str, has_cam: bool, supports_subchannels: bool) {
        self.state().cards.push(Card {
            id,
            name: name.to_string(),
            has_cam,
            decrypt_limit: u32::from(has_cam),
            supports_subchannels,
            priority: id,
            enabled: true,
        });
    }

    pub fn set_decrypt_limit(&self, card_id: i32, limit: u32) {
        let mut state = self.state();
        let card = state
            .cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .expect("unknown card");
        card.decrypt_limit = limit;
    }

    /// Adds a channel, creating its group on first sight.
    pub fn add_channel(&self, id: i32, name: &str, group: &str) {
        let mut state = self.state();
        if !state.groups.iter().any(|g| g.name == group) {
            let group_id = state.groups.len() as i32 + 1;
            state.groups.push(ChannelGroup {
                id: group_id,
                name: group.to_string(),
                media_kind: MediaKind::Tv,
                sort_order: group_id,
            });
        }
        state.channels.push(Channel {
            id,
            name: name.to_string(),
            media_kind: MediaKind::Tv,
            group_names: vec![group.to_string()],
        });
    }

    pub fn add_tuning(
        &self,
        id: i32,
        name: &str,
        card_id: i32,
        channel_id: i32,
        frequency: u32,
        encrypted: bool,
    ) {
        self.state().tunings.insert(
            (card_id, channel_id),
            TuningDetail {
                id,
                channel_id,
                name: name.to_string(),
                frequency,
                modulation: 16,
                symbol_rate: 6000,
                network_id: 1,
                encrypted,
                media_kind: MediaKind::Tv,
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_program(
        &self,
        id: i32,
        channel_id: i32,
        title: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        genre: &str,
        star_rating: i32,
    ) {
        self.state().programs.push(Program {
            id,
            channel_id,
            title: title.to_string(),
            description: description.to_string(),
            start,
            end,
            genre: genre.to_string(),
            epg_genre: None,
            star_rating,
            season_number: None,
            episode_number: None,
            episode_title: None,
        });
    }

    /// Like [`add_program`](Self::add_program) with series metadata; negative
    /// season or episode numbers model a guide without structured fields.
    #[allow(clippy::too_many_arguments)]
    pub fn add_series_program(
        &self,
        id: i32,
        channel_id: i32,
        title: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        genre: &str,
        star_rating: i32,
        season: i32,
        episode: i32,
        episode_title: &str,
    ) {
        self.add_program(id, channel_id, title, description, start, end, genre, star_rating);
        let mut state = self.state();
        let program = state.programs.last_mut().expect("just pushed");
        program.season_number = (season >= 0).then(|| season.to_string());
        program.episode_number = (episode >= 0).then(|| episode.to_string());
        program.episode_title = Some(episode_title.to_string());
    }

    pub fn add_owned_episode(&self, series: &str, season: u32, episode: u32) {
        self.state()
            .owned
            .entry(series.to_lowercase())
            .or_default()
            .push(EpisodeNumber { season, episode });
    }

    pub fn add_recording(&self, title: &str) {
        self.state().recordings.push(Recording { title: title.to_string() });
    }

    pub fn cancelled_count(&self) -> usize {
        self.state().cancelled.len()
    }

    pub fn schedules_snapshot(&self) -> Vec<Schedule> {
        self.state().schedules.clone()
    }

    pub fn rules_snapshot(&self) -> Vec<ScheduleRule> {
        self.state().rules.clone()
    }
}

/// The guide overlap test: a program belongs to `[from, to]` when it ends
/// inside it, starts inside it, or spans it entirely.
fn in_slot(program: &Program, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    (program.end > from && program.end < to)
        || (program.start >= from && program.start <= to)
        || (program.start <= from && program.end >= to)
}

#[async_trait]
impl ProgramGuide for Backend {
    async fn programs(
        &self,
        channel_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<Program>> {
        let mut programs: Vec<Program> = self
            .state()
            .programs
            .iter()
            .filter(|p| p.channel_id == channel_id && in_slot(p, from, to))
            .cloned()
            .collect();
        programs.sort_by_key(|p| (p.start, p.id));
        Ok(programs)
    }

    async fn programs_by_title(
        &self,
        title: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<Program>> {
        let mut programs: Vec<Program> = self
            .state()
            .programs
            .iter()
            .filter(|p| p.title.eq_ignore_ascii_case(title) && in_slot(p, from, to))
            .cloned()
            .collect();
        programs.sort_by_key(|p| (p.start, p.id));
        Ok(programs)
    }

    async fn programs_for_group(
        &self,
        group_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ProviderResult<Vec<Program>> {
        let state = self.state();
        let Some(group) = state.groups.iter().find(|g| g.id == group_id) else {
            return Ok(Vec::new());
        };
        let channel_ids: Vec<i32> = state
            .channels
            .iter()
            .filter(|c| c.group_names.contains(&group.name))
            .map(|c| c.id)
            .collect();
        let mut programs: Vec<Program> = state
            .programs
            .iter()
            .filter(|p| channel_ids.contains(&p.channel_id) && in_slot(p, from, to))
            .cloned()
            .collect();
        programs.sort_by_key(|p| (p.start, p.id));
        Ok(programs)
    }

    async fn program(&self, program_id: i32) -> ProviderResult<Option<Program>> {
        Ok(self.state().programs.iter().find(|p| p.id == program_id).cloned())
    }
}

#[async_trait]
impl ChannelDirectory for Backend {
    async fn groups(&self) -> ProviderResult<Vec<ChannelGroup>> {
        Ok(self.state().groups.clone())
    }

    async fn channels(&self, group_id: i32) -> ProviderResult<Vec<Channel>> {
        let state = self.state();
        let Some(group) = state.groups.iter().find(|g| g.id == group_id) else {
            return Ok(Vec::new());
        };
        Ok(state
            .channels
            .iter()
            .filter(|c| c.group_names.contains(&group.name))
            .cloned()
            .collect())
    }

    async fn channel(&self, channel_id: i32) -> ProviderResult<Option<Channel>> {
        Ok(self.state().channels.iter().find(|c| c.id == channel_id).cloned())
    }
}

#[async_trait]
impl TunerProvider for Backend {
    async fn cards(&self) -> ProviderResult<Vec<Card>> {
        Ok(self.state().cards.clone())
    }

    async fn tuning_detail(
        &self,
        card_id: i32,
        channel_id: i32,
    ) -> ProviderResult<Option<TuningDetail>> {
        Ok(self.state().tunings.get(&(card_id, channel_id)).cloned())
    }
}

#[async_trait]
impl MediaLibrary for Backend {
    async fn owned_episodes(&self, series_title: &str) -> ProviderResult<Vec<EpisodeNumber>> {
        Ok(self
            .state()
            .owned
            .get(&series_title.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn archived_recordings(&self) -> ProviderResult<Vec<Recording>> {
        Ok(self.state().recordings.clone())
    }
}

#[async_trait]
impl ScheduleStore for Backend {
    async fn schedules(&self) -> ProviderResult<Vec<Schedule>> {
        Ok(self.state().schedules.clone())
    }

    async fn schedule(&self, schedule_id: i32) -> ProviderResult<Option<Schedule>> {
        Ok(self.state().schedules.iter().find(|s| s.id == schedule_id).cloned())
    }

    async fn create_schedule(&self, mut schedule: Schedule) -> ProviderResult<Schedule> {
        let mut state = self.state();
        schedule.id = state.next_schedule_id;
        state.next_schedule_id += 1;
        state.schedules.push(schedule.clone());
        Ok(schedule)
    }

    async fn update_schedule(&self, schedule: Schedule) -> ProviderResult<Schedule> {
        let mut state = self.state();
        let stored = state
            .schedules
            .iter_mut()
            .find(|s| s.id == schedule.id)
            .ok_or_else(|| {
                dvr_scheduler::errors::ProviderError::not_found("schedule", schedule.id)
            })?;
        *stored = schedule.clone();
        Ok(schedule)
    }

    async fn delete_schedule(&self, schedule_id: i32) -> ProviderResult<()> {
        self.state().schedules.retain(|s| s.id != schedule_id);
        Ok(())
    }

    async fn cancelled_instances(&self) -> ProviderResult<Vec<CancelledInstance>> {
        Ok(self.state().cancelled.clone())
    }

    async fn add_cancelled_instance(&self, instance: CancelledInstance) -> ProviderResult<()> {
        let mut state = self.state();
        if !state.cancelled.contains(&instance) {
            state.cancelled.push(instance);
        }
        Ok(())
    }

    async fn remove_cancelled_instance(&self, instance: CancelledInstance) -> ProviderResult<()> {
        self.state().cancelled.retain(|i| *i != instance);
        Ok(())
    }

    async fn rules(&self) -> ProviderResult<Vec<ScheduleRule>> {
        Ok(self.state().rules.clone())
    }

    async fn rule(&self, rule_id: i32) -> ProviderResult<Option<ScheduleRule>> {
        Ok(self.state().rules.iter().find(|r| r.id == rule_id).cloned())
    }

    async fn create_rule(&self, mut rule: ScheduleRule) -> ProviderResult<ScheduleRule> {
        let mut state = self.state();
        rule.id = state.next_rule_id;
        state.next_rule_id += 1;
        state.rules.push(rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, rule: ScheduleRule) -> ProviderResult<ScheduleRule> {
        let mut state = self.state();
        let stored = state
            .rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| dvr_scheduler::errors::ProviderError::not_found("rule", rule.id))?;
        *stored = rule.clone();
        Ok(rule)
    }

    async fn delete_rule(&self, rule_id: i32) -> ProviderResult<()> {
        self.state().rules.retain(|r| r.id != rule_id);
        Ok(())
    }

    async fn replace_conflicts(&self, conflicts: Vec<Conflict>) -> ProviderResult<()> {
        self.state().conflicts = conflicts;
        Ok(())
    }

    async fn conflicts(&self) -> ProviderResult<Vec<Conflict>> {
        Ok(self.state().conflicts.clone())
    }
}

/// Monday the guide starts on.
pub fn start_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 3, 0, 0, 0).unwrap()
}

/// Builds the canned head-end:
///
/// - card 1 has a CAM (one decode slot) and subchannel support,
/// - card 2 is free-to-air with subchannel support,
/// - card 3 is free-to-air without subchannel support;
/// - channels 1 and 2 share an encrypted transponder on card 1,
/// - channels 3 and 4 share a free transponder on card 2,
/// - channels 5 and 6 sit on separate transponders of card 3.
pub fn backend() -> Arc<Backend> {
    let backend = Backend::new();
    let start = start_date();
    let day = |d: i64| start + Duration::days(d);
    let hours = |d: i64, h: i64| day(d) + Duration::hours(h);

    backend.add_card(1, "CAM Card (Transponder)", true, true);
    backend.add_card(2, "Free Card (Transponder)", false, true);
    backend.add_card(3, "Free Card", false, false);

    for id in 1..=6 {
        backend.add_channel(id, &format!("Channel {id}"), "Test");
    }

    backend.add_tuning(1, "Card 1 Channel 1", 1, 1, 100, true);
    backend.add_tuning(2, "Card 1 Channel 2", 1, 2, 100, true);
    backend.add_tuning(5, "Card 2 Channel 3", 2, 3, 101, false);
    backend.add_tuning(6, "Card 2 Channel 4", 2, 4, 101, false);
    backend.add_tuning(10, "Card 3 Channel 5", 3, 5, 102, false);
    backend.add_tuning(11, "Card 3 Channel 6", 3, 6, 103, false);

    let mut id = 1;
    let mut next = || {
        let current = id;
        id += 1;
        current
    };

    // Channel 1: Series 1 airs Mondays and Wednesdays with a rerun of each
    // episode, Series 2 daily, Series 3 on the first seven days.
    for (d, episode) in [(0, 1), (2, 1), (7, 2), (9, 2)] {
        backend.add_series_program(
            next(), 1, "Series 1", "",
            hours(d, 0), hours(d, 1),
            "Genre 1", 3, 1, episode,
            &format!("Series 1 Episode S01E{episode:02}"),
        );
    }
    for d in 0..14 {
        let episode = d as i32 + 1;
        backend.add_series_program(
            next(), 1, "Series 2", "",
            hours(d, 1), hours(d, 2),
            "Genre 2", 3, 1, episode,
            &format!("Series 2 Episode S01E{episode:02}"),
        );
    }
    for d in 0..7 {
        let episode = d as i32 + 1;
        backend.add_series_program(
            next(), 1, "Series 3", "",
            hours(d, 2), hours(d, 3),
            "Genre 3", 3, 1, episode,
            &format!("Series 3 Episode S01E{episode:02}"),
        );
    }

    // Channel 2: a movie block, then Series 3 continues without structured
    // episode numbers; the identity hides in the description.
    let movies = [
        ("Movie 1", "Genre 4", 5),
        ("Movie 2", "Genre 5", 4),
        ("Movie 3", "Genre 6", 3),
        ("Movie 1", "Genre 4", 5),
        ("Movie 2", "Genre 5", 3),
        ("Movie 3", "Genre 6", 3),
        ("Movie 4", "Genre 7", 5),
    ];
    for (d, (title, genre, rating)) in movies.into_iter().enumerate() {
        let d = d as i64;
        backend.add_program(next(), 2, title, "", hours(d, 0), hours(d, 2), genre, rating);
    }
    for d in 7..14 {
        let episode = d - 1;
        backend.add_series_program(
            next(), 2, "Series 3",
            &format!("Series 3 S01E{episode:02}"),
            hours(d, 2), hours(d, 3),
            "Genre 3", 3, -1, -1,
            &format!("Series 3 Episode S01E{episode:02}"),
        );
    }

    // Channels 3 and 4 carry the same movie block; channel 3 adds Series 4
    // airing its episodes in reverse, channel 4 adds Series 5 with a few
    // occurrences drifted off the full hour.
    let movies = [
        ("Movie 7", "Genre 8"),
        ("Movie 8", "Genre 8"),
        ("Movie 9", "Genre 8"),
        ("Movie 10", "Genre 9"),
        ("Movie 11", "Genre 9"),
        ("Movie 12", "Genre 9"),
        ("Movie 13", "Genre 10"),
    ];
    for channel in [3, 4] {
        for (d, (title, genre)) in movies.into_iter().enumerate() {
            let d = d as i64;
            backend.add_program(next(), channel, title, "", hours(d, 0), hours(d, 2), genre, 3);
        }
        if channel == 4 {
            continue;
        }
        for d in 0..14 {
            let (season, episode) = if d < 7 { (2, 7 - d) } else { (1, 14 - d) };
            let digits = if season == 2 || episode > 5 {
                format!("S0{season}E0{episode}")
            } else {
                format!("S0{season}E{episode}")
            };
            backend.add_series_program(
                next(), 3, "Series 4",
                &format!("Description {}", 14 - d),
                hours(d, 2), hours(d, 3),
                "Genre 4", 3, season as i32, episode as i32,
                &format!("Series 4 Episode {digits}"),
            );
        }
    }
    for d in 0..14i64 {
        let episode = d + 1;
        let drift = match d {
            3 => Duration::minutes(-12),
            6 => Duration::minutes(6),
            10 => Duration::minutes(18),
            _ => Duration::zero(),
        };
        backend.add_series_program(
            next(), 4, "Series 5", "",
            hours(d, 3) + drift, hours(d, 4) + drift,
            "Genre 5", 3, 1, episode as i32,
            &format!("Series 5 Episode S01E{episode:02}"),
        );
    }

    // Channels 5 and 6: one movie per day on single-transponder card 3.
    // Movie 20 airs a quarter hour earlier than the guide first announced.
    let movies = [
        ("Movie 14", "Genre 8", 3),
        ("Movie 15", "Genre 8", 3),
        ("Movie 16", "Genre 8", 3),
        ("Movie 17", "Genre 9", 3),
        ("Movie 18", "Genre 9", 5),
        ("Movie 19", "Genre 9", 3),
    ];
    for (d, (title, genre, rating)) in movies.into_iter().enumerate() {
        let d = d as i64;
        backend.add_program(next(), 5, title, "", hours(d, 0), hours(d, 2), genre, rating);
    }
    backend.add_program(
        next(), 5, "Movie 20", "",
        hours(6, 0) - Duration::minutes(15),
        hours(6, 2) - Duration::minutes(15),
        "Genre 10", 3,
    );
    let movies = [
        ("Movie 21", "Genre 8", 3),
        ("Movie 22", "Genre 8", 3),
        ("Movie 23", "Genre 8", 3),
        ("Movie 24", "Genre 9", 3),
        ("Movie 25", "Genre 9", 3),
        ("Movie 26", "Genre 9", 3),
        ("Movie 27", "Genre 10", 5),
    ];
    for (d, (title, genre, rating)) in movies.into_iter().enumerate() {
        let d = d as i64;
        backend.add_program(next(), 6, title, "", hours(d, 0), hours(d, 2), genre, rating);
    }

    backend
}

/// Engine wired against `backend` for all five collaborator roles, started
/// at the fixture's guide start.
pub fn engine(backend: &Arc<Backend>, settings: SchedulerSettings) -> SchedulerEngine {
    SchedulerEngine::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        settings,
        start_date(),
    )
    .expect("engine settings")
}

/// A schedule request with the fixture defaults: five minutes of padding on
/// both sides, kept forever.
pub fn request(
    channel_id: i32,
    name: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    recording_type: RecordingType,
    priority: SchedulePriority,
) -> ScheduleRequest {
    ScheduleRequest {
        channel_id,
        name: name.to_string(),
        start,
        end,
        recording_type,
        pre_padding: Duration::minutes(5),
        post_padding: Duration::minutes(5),
        priority,
        keep_method: KeepMethod::Always,
        keep_date: None,
    }
}

/// A rule with the fixture defaults; scope, window and series fields start
/// empty and are filled in per test.
pub fn rule(name: &str, targets: Vec<RuleTarget>) -> ScheduleRule {
    ScheduleRule {
        id: 0,
        name: name.to_string(),
        active: true,
        targets,
        channel_group_id: None,
        channel_id: None,
        window_start: None,
        window_end: None,
        active_from: None,
        active_to: None,
        series_name: None,
        season_filter: None,
        episode_filter: None,
        episode_title_filter: None,
        episode_info_regex: None,
        episode_info_fallback: EpisodeInfoFallback::None,
        recording_type: RuleRecordingType::All,
        pre_padding: Duration::minutes(5),
        post_padding: Duration::minutes(5),
        priority: SchedulePriority::Low,
        keep_method: KeepMethod::Always,
        keep_date: None,
    }
}

pub fn day(d: i64) -> DateTime<Utc> {
    start_date() + Duration::days(d)
}

pub fn at(d: i64, hour: i64) -> DateTime<Utc> {
    day(d) + Duration::hours(hour)
}
