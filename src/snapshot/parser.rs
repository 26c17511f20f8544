//! Reader for `LatestSnapshotMarket.log`.
//!
//! Recovers sports, teams, player-like names and market keys from the
//! text written by [`super::format::format_market_snapshot_log`].

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::names::filter_player_names;

static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Entry\s+\d+:\s+Sport\s+(\S+)(?:\s+\((.+)\))?").unwrap());
static EVENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Event\s+[^:]+::\s+(.+?)\s+@").unwrap());
static MARKETS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Markets\s*\(\d+\):\s*(.+)").unwrap());
static VS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+vs\s+").unwrap());
static SUMMARY_SPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-\s*([^()\s]+)(?:\s+\((.+)\))?\s*$").unwrap());

const SUMMARY_HEADER: &str = "Markets by sport:";
const ODDS_MARKER: &str = "Odds payload:";

/// Sport seen in a parsed log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSport {
    /// Sport key.
    pub sport_key: String,
    /// Sport title, when the entry line carried one.
    pub sport_title: Option<String>,
}

/// Structured summary recovered from a market snapshot log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedSnapshotSummary {
    /// Sports in first-seen order.
    pub sports: Vec<ParsedSport>,
    /// Sorted team names.
    pub teams: Vec<String>,
    /// Sorted player-like names.
    pub players: Vec<String>,
    /// Sorted market keys.
    pub markets: Vec<String>,
}

fn track_sport(sports: &mut Vec<ParsedSport>, key: &str, title: Option<&str>) {
    let title = title.map(str::trim).filter(|t| !t.is_empty());

    match sports.iter_mut().find(|s| s.sport_key == key) {
        Some(existing) => {
            if existing.sport_title.is_none() {
                existing.sport_title = title.map(str::to_string);
            }
        }
        None => sports.push(ParsedSport {
            sport_key: key.to_string(),
            sport_title: title.map(str::to_string),
        }),
    }
}

/// Parse the first JSON value in `text`, returning it with the bytes consumed.
fn parse_json_block(text: &str) -> Option<(Value, usize)> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Some((value, stream.byte_offset())),
        _ => None,
    }
}

/// Collect outcome names from every `outcomes` array nested in `odds`.
fn collect_outcome_names(odds: &Value, names: &mut Vec<String>) {
    match odds {
        Value::Array(items) => items.iter().for_each(|item| collect_outcome_names(item, names)),
        Value::Object(map) => {
            if let Some(Value::Array(outcomes)) = map.get("outcomes") {
                for outcome in outcomes {
                    let participant = outcome
                        .get("participant")
                        .and_then(Value::as_str)
                        .or_else(|| outcome.get("name").and_then(Value::as_str));
                    let description = outcome.get("description").and_then(Value::as_str);
                    names.extend(participant.into_iter().chain(description).map(str::to_string));
                }
            }
            map.values().for_each(|value| collect_outcome_names(value, names));
        }
        _ => {}
    }
}

/// Parse a market snapshot log into its sports, teams, players and markets.
///
/// The `Markets by sport:` summary, when present, is read up to the first
/// entry. Unrecognised lines are skipped; a malformed odds block ends that
/// entry's payload but not the parse.
pub fn parse_market_snapshot_log(text: &str) -> ParsedSnapshotSummary {
    let lines: Vec<&str> = text.lines().collect();
    let mut sports = Vec::new();
    let mut teams = BTreeSet::new();
    let mut markets = BTreeSet::new();
    let mut outcome_names = Vec::new();
    let mut in_summary = false;

    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        index += 1;

        if line.trim() == SUMMARY_HEADER {
            in_summary = true;
            continue;
        }

        if let Some(caps) = ENTRY_RE.captures(line) {
            in_summary = false;
            track_sport(&mut sports, &caps[1], caps.get(2).map(|m| m.as_str()));
            continue;
        }

        if in_summary {
            if let Some(caps) = SUMMARY_SPORT_RE.captures(line) {
                track_sport(&mut sports, &caps[1], caps.get(2).map(|m| m.as_str()));
                continue;
            }
        }

        if let Some(caps) = EVENT_RE.captures(line) {
            teams.extend(
                VS_RE
                    .split(&caps[1])
                    .map(str::trim)
                    .filter(|team| !team.is_empty())
                    .map(str::to_string),
            );
            continue;
        }

        if let Some(caps) = MARKETS_RE.captures(line) {
            markets.extend(
                caps[1]
                    .split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty() && *key != "none")
                    .map(str::to_string),
            );
            continue;
        }

        if line.trim_end().ends_with(ODDS_MARKER) {
            let rest = lines[index..].join("\n");
            if let Some((odds, consumed)) = parse_json_block(&rest) {
                collect_outcome_names(&odds, &mut outcome_names);
                index += rest[..consumed].matches('\n').count() + 1;
            }
        }
    }

    let teams: Vec<String> = teams.into_iter().collect();
    let players = filter_player_names(outcome_names, &teams);

    ParsedSnapshotSummary {
        sports,
        teams,
        players,
        markets: markets.into_iter().collect(),
    }
}

/// Read and parse a market snapshot log from disk.
pub async fn read_market_snapshot_log(path: impl AsRef<Path>) -> Result<ParsedSnapshotSummary> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_market_snapshot_log(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::format::format_market_snapshot_log;
    use crate::snapshot::options::ResolvedOptions;
    use crate::snapshot::types::{MarketSnapshotResult, SnapshotEventEntry};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use time::macros::datetime;

    fn entry(sport: &str, title: Option<&str>, event: &str, teams: [&str; 2], markets: &[&str], odds: Value) -> SnapshotEventEntry {
        SnapshotEventEntry {
            sport_key: sport.to_string(),
            sport_title: title.map(str::to_string),
            event_id: event.to_string(),
            teams: teams.iter().map(|t| t.to_string()).collect(),
            start_time: datetime!(2024-03-01 20:00 UTC),
            market_keys: markets.iter().map(|m| m.to_string()).collect(),
            odds_fetched_at: datetime!(2024-03-01 12:00 UTC),
            odds,
        }
    }

    #[test]
    fn parses_a_formatted_snapshot_log() {
        let odds = json!({
            "id": "E1",
            "bookmakers": [{
                "key": "fanduel",
                "markets": [
                    {"key": "h2h", "outcomes": [{"name": "Lakers"}, {"name": "Celtics"}]},
                    {"key": "player_points", "outcomes": [
                        {"name": "Over", "description": "LeBron James {GSW}"},
                        {"name": "Under", "description": "Jayson Tatum"}
                    ]}
                ]
            }]
        });
        let entries = vec![
            entry("basketball_nba", Some("NBA"), "E1", ["Lakers", "Celtics"], &["h2h", "player_points"], odds),
            entry("icehockey_nhl", None, "E2", ["Bruins", "Rangers"], &[], json!({"id": "E2", "bookmakers": []})),
        ];
        let snapshot = MarketSnapshotResult {
            captured_at: datetime!(2024-03-01 12:00 UTC),
            log_path: PathBuf::new(),
            options: ResolvedOptions::default(),
            sports_checked: 2,
            events_captured: 2,
            entries,
            markets_by_sport: Vec::new(),
            warnings: vec!["No events found for sport baseball_mlb within the next 48 hours.".to_string()],
        };
        let log = format_market_snapshot_log(&snapshot).unwrap();

        let summary = parse_market_snapshot_log(&log);

        assert_eq!(
            summary.sports,
            vec![
                ParsedSport {
                    sport_key: "basketball_nba".to_string(),
                    sport_title: Some("NBA".to_string()),
                },
                ParsedSport {
                    sport_key: "icehockey_nhl".to_string(),
                    sport_title: None,
                },
            ]
        );
        assert_eq!(summary.teams, vec!["Bruins", "Celtics", "Lakers", "Rangers"]);
        assert_eq!(summary.players, vec!["Jayson Tatum", "LeBron James {GSW}"]);
        assert_eq!(summary.markets, vec!["h2h", "player_points"]);
    }

    #[test]
    fn markets_by_sport_summary_is_read() {
        let log = [
            "Market snapshot captured at 2024-03-01T12:00:00Z",
            "Sports checked: 2",
            "",
            "Markets by sport:",
            "- soccer_epl (EPL)",
            "  Markets (2): btts, h2h",
            "- icehockey_nhl",
            "  Markets (0): none",
            "",
            "Entry 1: Sport icehockey_nhl (NHL)",
            "  Event E1 :: Bruins vs Rangers @ 2024-03-01T20:00:00Z",
            "  Markets (1): totals",
        ]
        .join("\n");

        let summary = parse_market_snapshot_log(&log);

        assert_eq!(
            summary.sports,
            vec![
                ParsedSport {
                    sport_key: "soccer_epl".to_string(),
                    sport_title: Some("EPL".to_string()),
                },
                ParsedSport {
                    sport_key: "icehockey_nhl".to_string(),
                    sport_title: Some("NHL".to_string()),
                },
            ]
        );
        assert_eq!(summary.markets, vec!["btts", "h2h", "totals"]);
    }

    #[test]
    fn participant_takes_precedence_over_name() {
        let mut names = Vec::new();
        collect_outcome_names(
            &json!([{"outcomes": [{"participant": "Shohei Ohtani", "name": "Yes"}]}]),
            &mut names,
        );
        assert_eq!(names, vec!["Shohei Ohtani"]);
    }

    #[test]
    fn malformed_payload_does_not_stop_the_parse() {
        let log = "Entry 1: Sport soccer_epl (EPL)\n  Odds payload:\n    {not json\n\nEntry 2: Sport soccer_epl\n  Event E2 :: Arsenal vs Chelsea @ 2024-03-01T20:00:00Z";

        let summary = parse_market_snapshot_log(log);

        assert_eq!(summary.sports.len(), 1);
        assert_eq!(summary.teams, vec!["Arsenal", "Chelsea"]);
        assert!(summary.players.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_market_snapshot_log(dir.path().join("absent.log")).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Io(_)));
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        assert_eq!(parse_market_snapshot_log(""), ParsedSnapshotSummary::default());
    }
}
