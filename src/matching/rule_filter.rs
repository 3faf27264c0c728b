//! Search-rule criteria evaluation.
//!
//! Channel scoping and validity windows are handled during expansion; this
//! module only answers whether one program's metadata satisfies a rule.

use crate::models::{Program, RuleSearchField, RuleSearchMatch, RuleTarget, ScheduleRule};

use super::time_window::window_matches;

fn text_matches(kind: RuleSearchMatch, haystack: &str, needle: &str) -> bool {
    match kind {
        RuleSearchMatch::Exact => haystack.to_lowercase() == needle.to_lowercase(),
        RuleSearchMatch::Include => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

/// Whether one target criterion holds for `program`. Star ratings compare
/// through their decimal text form.
pub fn target_matches(target: &RuleTarget, program: &Program) -> bool {
    match target.field {
        RuleSearchField::Title => text_matches(target.match_kind, &program.title, &target.text),
        RuleSearchField::Genre => text_matches(target.match_kind, &program.genre, &target.text),
        RuleSearchField::Description => {
            text_matches(target.match_kind, &program.description, &target.text)
        }
        RuleSearchField::StarRating => text_matches(
            target.match_kind,
            &program.star_rating.to_string(),
            &target.text,
        ),
    }
}

/// Whether `program` satisfies every criterion of `rule`: all targets, the
/// series/season/episode filters, and the optional time-of-day window.
pub fn rule_covers(rule: &ScheduleRule, program: &Program) -> bool {
    if !rule.targets.iter().all(|t| target_matches(t, program)) {
        return false;
    }
    if let Some(series) = &rule.series_name {
        if !text_matches(RuleSearchMatch::Exact, &program.title, series) {
            return false;
        }
    }
    if let Some(season) = &rule.season_filter {
        if program.season_number.as_deref().map(str::trim) != Some(season.trim()) {
            return false;
        }
    }
    if let Some(episode) = &rule.episode_filter {
        if program.episode_number.as_deref().map(str::trim) != Some(episode.trim()) {
            return false;
        }
    }
    if let Some(wanted) = &rule.episode_title_filter {
        let matched = program
            .episode_title
            .as_deref()
            .is_some_and(|t| text_matches(RuleSearchMatch::Exact, t, wanted));
        if !matched {
            return false;
        }
    }
    if let (Some(window_start), Some(window_end)) = (rule.window_start, rule.window_end) {
        if !window_matches(window_start, window_end, program) {
            return false;
        }
    }
    true
}
