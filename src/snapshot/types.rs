//! Snapshot result types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumIter, IntoStaticStr};
use time::OffsetDateTime;

use crate::catalog::{MarketCatalogEntry, MARKET_CATALOG_LOG_FILENAME};
use crate::odds_api::types::{OddsSnapshot, Sport};

use super::options::ResolvedOptions;

/// Which artifact a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SnapshotKind {
    /// Markets and odds per event.
    Market,
    /// Active sports directory.
    SportNames,
    /// Team names per sport.
    TeamNames,
    /// Player-like outcome names per sport.
    PlayerNames,
    /// Market reference catalog.
    MarketCatalog,
}

impl SnapshotKind {
    /// Fixed file name of the artifact.
    pub fn file_name(self) -> &'static str {
        match self {
            SnapshotKind::Market => "LatestSnapshotMarket.log",
            SnapshotKind::SportNames => "LatestSnapshotSportNames.log",
            SnapshotKind::TeamNames => "LatestSnapshotTeamNames.log",
            SnapshotKind::PlayerNames => "LatestSnapshotPlayerNames.log",
            SnapshotKind::MarketCatalog => MARKET_CATALOG_LOG_FILENAME,
        }
    }

    /// Low-cardinality label for logs and metrics.
    pub fn label(self) -> &'static str {
        self.into()
    }
}

/// Sport title, `None` when upstream sent a blank one.
pub(crate) fn sport_title(sport: &Sport) -> Option<String> {
    let title = sport.title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// One scanned event of the market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEventEntry {
    /// Owning sport key.
    pub sport_key: String,
    /// Owning sport title.
    pub sport_title: Option<String>,
    /// Event ID.
    pub event_id: String,
    /// Normalized team pair.
    pub teams: Vec<String>,
    /// Event start.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// Resolved market keys.
    pub market_keys: Vec<String>,
    /// When the odds were fetched.
    #[serde(with = "time::serde::rfc3339")]
    pub odds_fetched_at: OffsetDateTime,
    /// Raw odds payload.
    pub odds: Value,
}

/// Market keys seen across one sport's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SportMarketSummary {
    /// Sport key.
    pub sport_key: String,
    /// Sport title.
    pub sport_title: Option<String>,
    /// Sorted unique market keys.
    pub market_keys: Vec<String>,
}

/// Result of the market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshotResult {
    /// Finalize time.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Where the log was written.
    pub log_path: PathBuf,
    /// Resolved options.
    pub options: ResolvedOptions,
    /// Sports scanned.
    pub sports_checked: usize,
    /// Events with an entry.
    pub events_captured: usize,
    /// One entry per scanned event.
    pub entries: Vec<SnapshotEventEntry>,
    /// Market keys per scanned sport.
    pub markets_by_sport: Vec<SportMarketSummary>,
    /// Per-scope warnings.
    pub warnings: Vec<String>,
}

/// One active sport in the sport-names snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SportNameEntry {
    /// Sport key.
    pub sport_key: String,
    /// Sport title.
    pub sport_title: Option<String>,
    /// Sport group.
    pub group: String,
    /// Long description.
    pub description: Option<String>,
    /// Whether outrights are offered.
    pub has_outrights: Option<bool>,
}

impl From<&Sport> for SportNameEntry {
    fn from(sport: &Sport) -> Self {
        Self {
            sport_key: sport.key.clone(),
            sport_title: sport_title(sport),
            group: sport.group.clone(),
            description: sport.description.clone(),
            has_outrights: sport.has_outrights,
        }
    }
}

/// Result of the sport-names snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SportNamesSnapshotResult {
    /// Finalize time.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Where the log was written.
    pub log_path: PathBuf,
    /// Resolved options.
    pub options: ResolvedOptions,
    /// Sports listed.
    pub sports_checked: usize,
    /// One entry per scoped active sport.
    pub sport_names: Vec<SportNameEntry>,
    /// Notes, e.g. no active sports.
    pub warnings: Vec<String>,
}

/// Team names of one sport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNameSummary {
    /// Sport key.
    pub sport_key: String,
    /// Sport title.
    pub sport_title: Option<String>,
    /// Sorted unique team names.
    pub teams: Vec<String>,
    /// Events scanned.
    pub events_checked: usize,
}

/// Result of the team-names snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNamesSnapshotResult {
    /// Finalize time.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Where the log was written.
    pub log_path: PathBuf,
    /// Resolved options.
    pub options: ResolvedOptions,
    /// Sports scanned.
    pub sports_checked: usize,
    /// Events scanned across all sports.
    pub events_captured: usize,
    /// One summary per sport with events.
    pub teams_by_sport: Vec<TeamNameSummary>,
    /// Per-scope warnings.
    pub warnings: Vec<String>,
}

/// Player-like names of one sport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNameSummary {
    /// Sport key.
    pub sport_key: String,
    /// Sport title.
    pub sport_title: Option<String>,
    /// Sorted unique player names, teams and generic labels removed.
    pub player_names: Vec<String>,
    /// Events scanned.
    pub events_checked: usize,
    /// `player_` markets scanned.
    pub markets_checked: usize,
}

/// Result of the player-names snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNamesSnapshotResult {
    /// Finalize time.
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Where the log was written.
    pub log_path: PathBuf,
    /// Resolved options.
    pub options: ResolvedOptions,
    /// Sports scanned.
    pub sports_checked: usize,
    /// Events scanned across all sports.
    pub events_captured: usize,
    /// `player_` markets scanned across all sports.
    pub markets_captured: usize,
    /// One summary per sport with events.
    pub player_names_by_sport: Vec<PlayerNameSummary>,
    /// Per-scope warnings.
    pub warnings: Vec<String>,
}

/// Warning attached to every crawl report.
pub const CRAWL_WARNING: &str =
    "This endpoint performs a full snapshot-style crawl of the Odds API for schema discovery. Use sparingly to conserve quota.";

/// Result of the full market catalog crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCatalogReport {
    /// Completion time.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Requested bookmakers.
    pub bookmakers: Vec<String>,
    /// Sports scanned.
    pub sports_scanned: usize,
    /// Events scanned.
    pub events_scanned: usize,
    /// Aggregate per market key.
    pub markets: BTreeMap<String, MarketCatalogEntry>,
    /// Quota warning.
    pub warning: &'static str,
}

/// Result of writing one event's market catalog log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarketCatalogReport {
    /// Completion time.
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// Sport key.
    pub sport_key: String,
    /// Event ID.
    pub event_id: String,
    /// Regions requested.
    pub regions: String,
    /// Bookmakers requested.
    pub bookmakers: Vec<String>,
    /// Catalog size.
    pub total_markets: usize,
    /// Core entries.
    pub core_markets: usize,
    /// Discovered entries.
    pub additional_markets: usize,
    /// Log file name.
    pub log_file: &'static str,
    /// Where the log was written.
    pub log_path: PathBuf,
}

/// Sport reference in the smoke report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SportRef {
    /// Sport key.
    pub key: String,
    /// Sport title.
    pub title: String,
}

/// Sample event drilled into by the smoke test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeSample {
    /// Event ID.
    pub event_id: String,
    /// Normalized team pair.
    pub teams: Vec<String>,
    /// Event start.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// Market keys requested for odds.
    pub markets_requested: Vec<String>,
    /// Market keys offered.
    pub total_markets_available: usize,
    /// Odds snapshot.
    pub odds: OddsSnapshot,
}

/// Result of the odds smoke test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsSmokeReport {
    /// Completion time.
    #[serde(with = "time::serde::rfc3339")]
    pub tested_at: OffsetDateTime,
    /// First active sport.
    pub primary_sport: SportRef,
    /// Events found in the window.
    pub events_checked: usize,
    /// Sample event, absent when the window is empty.
    pub sample_event: Option<SmokeSample>,
    /// Explanation when no sample was taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_kind_has_a_distinct_log_file() {
        let names: std::collections::HashSet<_> = SnapshotKind::iter().map(SnapshotKind::file_name).collect();
        assert_eq!(names.len(), 5);
        assert_eq!(SnapshotKind::PlayerNames.file_name(), "LatestSnapshotPlayerNames.log");
        assert_eq!(SnapshotKind::MarketCatalog.file_name(), "LatestMarketsCatalog.log");
    }

    #[test]
    fn kind_labels_are_kebab_case() {
        assert_eq!(SnapshotKind::SportNames.label(), "sport-names");
        assert_eq!(SnapshotKind::Market.to_string(), "market");
    }

    #[test]
    fn blank_titles_are_dropped() {
        let mut sport = Sport {
            key: "basketball_nba".to_string(),
            group: "Basketball".to_string(),
            title: "  ".to_string(),
            description: None,
            active: true,
            has_outrights: None,
        };
        assert_eq!(sport_title(&sport), None);

        sport.title = "NBA".to_string();
        assert_eq!(SportNameEntry::from(&sport).sport_title.as_deref(), Some("NBA"));
    }
}
