//! Team and player name heuristics.
//!
//! Team pairs always resolve to exactly two names, falling back to the
//! `Home Team` / `Away Team` placeholders. Player-like names come from
//! `player_` markets and are filtered against team names and generic
//! outcome labels before they are reported.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::odds_api::types::{EventSummary, MarketDefinition};

/// Placeholder for a missing home side.
pub const HOME_TEAM_PLACEHOLDER: &str = "Home Team";
/// Placeholder for a missing away side.
pub const AWAY_TEAM_PLACEHOLDER: &str = "Away Team";

/// Market key prefix marking player propositions.
pub const PLAYER_MARKET_PREFIX: &str = "player_";

/// Outcome labels that are never player names (compared lowercase).
pub const GENERIC_LABELS: [&str; 7] = [
    "over",
    "under",
    "yes",
    "no",
    "draw",
    "home team",
    "away team",
];

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the team pair for an event.
///
/// Priority: the payload's non-empty team list, then home/away fields with
/// a placeholder for a missing side, then both placeholders.
pub fn normalize_teams(event: &EventSummary) -> Vec<String> {
    let teams: Vec<String> = event
        .teams
        .iter()
        .filter(|t| !t.trim().is_empty())
        .cloned()
        .collect();
    if !teams.is_empty() {
        return teams;
    }

    let home = non_blank(event.home_team.as_deref());
    let away = non_blank(event.away_team.as_deref());

    match (home, away) {
        (Some(home), Some(away)) => vec![home, away],
        (Some(home), None) => vec![home, AWAY_TEAM_PLACEHOLDER.to_string()],
        (None, Some(away)) => vec![HOME_TEAM_PLACEHOLDER.to_string(), away],
        (None, None) => vec![
            HOME_TEAM_PLACEHOLDER.to_string(),
            AWAY_TEAM_PLACEHOLDER.to_string(),
        ],
    }
}

/// Render a team pair as `A vs B`.
pub fn matchup_label(teams: &[String]) -> String {
    match teams {
        [] => format!("{} vs {}", HOME_TEAM_PLACEHOLDER, AWAY_TEAM_PLACEHOLDER),
        [only] => format!("{} vs {}", only, AWAY_TEAM_PLACEHOLDER),
        [first, second, ..] => format!("{} vs {}", first, second),
    }
}

/// Whether a market key is a player proposition.
pub fn is_player_market(key: &str) -> bool {
    key.starts_with(PLAYER_MARKET_PREFIX)
}

fn outcome_string(outcome: &Value, field: &str) -> Option<String> {
    non_blank(outcome.get(field).and_then(Value::as_str))
}

/// Collect `description` and `participant` strings from `player_` markets,
/// deduplicated and sorted.
pub fn extract_player_outcome_names(markets: &[MarketDefinition]) -> Vec<String> {
    let names: BTreeSet<String> = markets
        .iter()
        .filter(|market| is_player_market(&market.key))
        .filter_map(|market| market.outcomes.as_ref())
        .flatten()
        .flat_map(|outcome| {
            [
                outcome_string(outcome, "description"),
                outcome_string(outcome, "participant"),
            ]
        })
        .flatten()
        .collect();

    names.into_iter().collect()
}

/// Whether a label is one of the generic outcome labels.
pub fn is_generic_label(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    GENERIC_LABELS.contains(&lowered.as_str())
}

/// Drop blanks, generic labels and known team names (case-insensitive).
///
/// The result is deduplicated and sorted.
pub fn filter_player_names<I, S>(names: I, known_teams: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let teams: HashSet<String> = known_teams
        .iter()
        .map(|team| team.trim().to_lowercase())
        .collect();

    let kept: BTreeSet<String> = names
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| !is_generic_label(name))
        .filter(|name| !teams.contains(&name.to_lowercase()))
        .collect();

    kept.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use time::macros::datetime;

    fn event(teams: &[&str], home: Option<&str>, away: Option<&str>) -> EventSummary {
        EventSummary {
            event_id: "E1".to_string(),
            sport_key: "basketball_nba".to_string(),
            teams: teams.iter().map(|t| t.to_string()).collect(),
            home_team: home.map(str::to_string),
            away_team: away.map(str::to_string),
            start_time: datetime!(2024-03-01 20:00 UTC),
        }
    }

    #[test]
    fn team_list_is_used_verbatim() {
        assert_eq!(
            normalize_teams(&event(&["Lakers", "Celtics"], Some("X"), Some("Y"))),
            vec!["Lakers", "Celtics"]
        );
    }

    #[test]
    fn missing_side_gets_a_placeholder() {
        assert_eq!(
            normalize_teams(&event(&[], Some("Lakers"), None)),
            vec!["Lakers", "Away Team"]
        );
        assert_eq!(
            normalize_teams(&event(&[], Some("  "), Some(" Celtics "))),
            vec!["Home Team", "Celtics"]
        );
    }

    #[test]
    fn no_team_data_yields_both_placeholders() {
        assert_eq!(
            normalize_teams(&event(&[], None, None)),
            vec!["Home Team", "Away Team"]
        );
        assert_eq!(
            normalize_teams(&event(&["", " "], None, None)),
            vec!["Home Team", "Away Team"]
        );
    }

    #[test]
    fn only_player_markets_contribute_names() {
        let markets = vec![
            MarketDefinition::new("h2h").with_outcomes(vec![json!({"name": "Lakers", "description": "Lakers"})]),
            MarketDefinition::new("player_points").with_outcomes(vec![
                json!({"name": "Over", "description": "LeBron James"}),
                json!({"name": "Under", "description": "LeBron James"}),
                json!({"name": "Over", "participant": "Anthony Davis", "description": ""}),
            ]),
            MarketDefinition::new("player_assists"),
        ];

        assert_eq!(
            extract_player_outcome_names(&markets),
            vec!["Anthony Davis", "LeBron James"]
        );
    }

    #[test]
    fn generic_labels_and_teams_are_filtered() {
        let known = vec!["Lakers".to_string()];
        assert_eq!(
            filter_player_names(["LeBron James", "Over", "Lakers"], &known),
            vec!["LeBron James"]
        );
        assert_eq!(
            filter_player_names(["DRAW", "home team", "lakers", " "], &known),
            Vec::<String>::new()
        );
    }

    #[test]
    fn matchup_label_formats_pairs() {
        let teams = vec!["Lakers".to_string(), "Celtics".to_string()];
        assert_eq!(matchup_label(&teams), "Lakers vs Celtics");
    }
}
