//! Episode identity and series de-duplication.
//!
//! Guide data is messy: structured season/episode fields are the preferred
//! identity source, but many providers bury the numbers in the description
//! text instead. [`EpisodeIdentityResolver`] extracts an identity from
//! either, caching compiled fallback patterns. [`EpisodeTracker`] then
//! applies the configured management scheme to a stream of candidates,
//! deciding which occurrences are worth a tuner.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::warn;

use crate::config::EpisodeManagementScheme;
use crate::models::{EpisodeNumber, Program};

/// Capture group names the fallback pattern must use.
const SEASON_GROUP: &str = "SeasonNo";
const EPISODE_GROUP: &str = "EpisodeNo";

/// Extracts `(season, episode)` identities from programs.
///
/// Compiled fallback patterns are cached per pattern text; a pattern that
/// fails to compile is logged once and treated as matching nothing.
#[derive(Debug, Default)]
pub struct EpisodeIdentityResolver {
    regex_cache: HashMap<String, Option<Regex>>,
}

impl EpisodeIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity of `program`, preferring the structured guide fields and
    /// falling back to `fallback_pattern` applied to the description.
    pub fn identity_of(
        &mut self,
        program: &Program,
        fallback_pattern: Option<&str>,
    ) -> Option<EpisodeNumber> {
        if let Some(identity) = program.episode_number() {
            return Some(identity);
        }
        let regex = self.compiled(fallback_pattern?)?;
        let caps = regex.captures(&program.description)?;
        let season = caps.name(SEASON_GROUP)?.as_str().parse().ok()?;
        let episode = caps.name(EPISODE_GROUP)?.as_str().parse().ok()?;
        Some(EpisodeNumber { season, episode })
    }

    fn compiled(&mut self, pattern: &str) -> Option<&Regex> {
        if !self.regex_cache.contains_key(pattern) {
            let compiled = match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Invalid episode info pattern '{}': {}", pattern, e);
                    None
                }
            };
            self.regex_cache.insert(pattern.to_string(), compiled);
        }
        self.regex_cache.get(pattern).and_then(|r| r.as_ref())
    }
}

/// Outcome of offering one candidate occurrence to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeDecision {
    Accepted,
    /// The library already holds this episode.
    AlreadyOwned,
    /// An earlier occurrence in this pass already claimed this episode.
    AlreadyBooked,
    /// The episode is not newer than everything owned or booked so far.
    NotNewer,
}

impl EpisodeDecision {
    pub fn is_accepted(self) -> bool {
        matches!(self, EpisodeDecision::Accepted)
    }
}

/// Applies one management scheme across a pass of candidates.
///
/// Candidates must be offered in airing order; acceptance under the
/// new-episodes scheme depends on what was accepted before.
#[derive(Debug)]
pub struct EpisodeTracker {
    scheme: EpisodeManagementScheme,
    owned: HashSet<EpisodeNumber>,
    /// Highest identity seen across library and accepted candidates.
    newest: Option<EpisodeNumber>,
    booked: HashSet<EpisodeNumber>,
}

impl EpisodeTracker {
    pub fn new(scheme: EpisodeManagementScheme, owned: Vec<EpisodeNumber>) -> Self {
        let newest = owned.iter().copied().max();
        Self {
            scheme,
            owned: owned.into_iter().collect(),
            newest,
            booked: HashSet::new(),
        }
    }

    /// Decides one candidate. Occurrences without an identity are always
    /// accepted; there is nothing to de-duplicate them against.
    pub fn admit(&mut self, identity: Option<EpisodeNumber>) -> EpisodeDecision {
        let Some(identity) = identity else {
            return EpisodeDecision::Accepted;
        };
        match self.scheme {
            EpisodeManagementScheme::None => EpisodeDecision::Accepted,
            EpisodeManagementScheme::NewEpisodesByEpisodeNumber => {
                if self.newest.is_some_and(|newest| identity <= newest) {
                    return EpisodeDecision::NotNewer;
                }
                self.newest = Some(identity);
                EpisodeDecision::Accepted
            }
            EpisodeManagementScheme::MissingEpisodesByEpisodeNumber => {
                if self.owned.contains(&identity) {
                    return EpisodeDecision::AlreadyOwned;
                }
                if !self.booked.insert(identity) {
                    return EpisodeDecision::AlreadyBooked;
                }
                EpisodeDecision::Accepted
            }
        }
    }
}
