//! Snapshot option resolution and scoping.
//!
//! Inbound values are lenient: anything that is not a finite positive
//! number, or not a non-blank string/list, falls back to the default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{DEFAULT_SNAPSHOT_BOOKMAKERS, DEFAULT_SNAPSHOT_REGIONS};
use crate::odds_api::types::{FetchOptions, MarketQuery, Sport};

/// Default forward window in hours.
pub const DEFAULT_HOURS_AHEAD: f64 = 48.0;
/// Default number of sports scanned.
pub const DEFAULT_MAX_SPORTS: usize = 3;
/// Default number of events scanned per sport.
pub const DEFAULT_MAX_EVENTS_PER_SPORT: usize = 10;

/// Crawl default: sports scanned.
pub const CRAWL_MAX_SPORTS: usize = 1;
/// Crawl default: events scanned per sport.
pub const CRAWL_MAX_EVENTS_PER_SPORT: usize = 3;
/// Crawl default bookmakers.
pub const CRAWL_BOOKMAKERS: [&str; 3] = ["fanduel", "draftkings", "novig"];

/// Raw snapshot options as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOptions {
    /// Forward window in hours.
    pub hours_ahead: Option<f64>,
    /// Sports limit.
    pub max_sports: Option<f64>,
    /// Events limit per sport.
    pub max_events_per_sport: Option<f64>,
    /// Comma-separated regions.
    pub regions: Option<String>,
    /// Bookmaker keys.
    pub bookmakers: Option<Vec<String>>,
    /// Use the response cache.
    pub use_cache: Option<bool>,
    /// Sports filter: comma-separated keys, or `all`.
    pub sports: Option<String>,
}

impl SnapshotOptions {
    /// Build options from query-string style pairs, dropping anything unparseable.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |name: &str| params.get(name).map(String::as_str);

        Self {
            hours_ahead: parse_number(get("hoursAhead")),
            max_sports: parse_number(get("maxSports")),
            max_events_per_sport: parse_number(get("maxEventsPerSport")),
            regions: get("regions").map(str::to_string),
            bookmakers: get("bookmakers").map(parse_csv),
            use_cache: parse_flag(get("useCache")),
            sports: get("sports").map(str::to_string),
        }
    }

    /// Resolve against the snapshot defaults.
    pub fn resolve(&self) -> ResolvedOptions {
        self.resolve_with(&OptionDefaults::snapshot())
    }

    /// Resolve against explicit defaults.
    pub fn resolve_with(&self, defaults: &OptionDefaults) -> ResolvedOptions {
        let regions = self
            .regions
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| defaults.regions.clone());

        let bookmakers = self
            .bookmakers
            .as_ref()
            .map(|list| {
                list.iter()
                    .map(|b| b.trim())
                    .filter(|b| !b.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| defaults.bookmakers.clone());

        ResolvedOptions {
            hours_ahead: positive_or(self.hours_ahead, defaults.hours_ahead),
            max_sports: count_or(self.max_sports, defaults.max_sports),
            max_events_per_sport: count_or(self.max_events_per_sport, defaults.max_events_per_sport),
            regions,
            bookmakers,
            use_cache: self.use_cache.unwrap_or(defaults.use_cache),
            sports: parse_sports_filter(self.sports.as_deref()),
        }
    }
}

/// Defaults applied during resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDefaults {
    /// Forward window in hours.
    pub hours_ahead: f64,
    /// Sports limit.
    pub max_sports: usize,
    /// Events limit per sport.
    pub max_events_per_sport: usize,
    /// Comma-separated regions.
    pub regions: String,
    /// Bookmaker keys.
    pub bookmakers: Vec<String>,
    /// Use the response cache.
    pub use_cache: bool,
}

impl OptionDefaults {
    /// Defaults of the four snapshot pipelines.
    pub fn snapshot() -> Self {
        Self {
            hours_ahead: DEFAULT_HOURS_AHEAD,
            max_sports: DEFAULT_MAX_SPORTS,
            max_events_per_sport: DEFAULT_MAX_EVENTS_PER_SPORT,
            regions: DEFAULT_SNAPSHOT_REGIONS.join(","),
            bookmakers: DEFAULT_SNAPSHOT_BOOKMAKERS.iter().map(|b| b.to_string()).collect(),
            use_cache: false,
        }
    }

    /// Defaults of the full catalog crawl.
    pub fn crawl() -> Self {
        Self {
            max_sports: CRAWL_MAX_SPORTS,
            max_events_per_sport: CRAWL_MAX_EVENTS_PER_SPORT,
            bookmakers: CRAWL_BOOKMAKERS.iter().map(|b| b.to_string()).collect(),
            ..Self::snapshot()
        }
    }
}

/// Fully resolved options recorded with every result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    /// Forward window in hours.
    pub hours_ahead: f64,
    /// Sports limit.
    pub max_sports: usize,
    /// Events limit per sport.
    pub max_events_per_sport: usize,
    /// Comma-separated regions.
    pub regions: String,
    /// Bookmaker keys.
    pub bookmakers: Vec<String>,
    /// Use the response cache.
    pub use_cache: bool,
    /// Sports filter; `None` means every active sport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sports: Option<Vec<String>>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        SnapshotOptions::default().resolve()
    }
}

impl ResolvedOptions {
    /// Region/bookmaker filters for market and odds calls.
    pub fn market_query(&self) -> MarketQuery {
        MarketQuery {
            regions: self.regions.clone(),
            bookmakers: self.bookmakers.clone(),
        }
    }

    /// Cache choice for every call of the run.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::cached(self.use_cache)
    }

    /// The `Options -> ...` line of the log artifacts.
    pub fn summary_line(&self) -> String {
        format!(
            "Options -> hoursAhead={}, maxSports={}, maxEventsPerSport={}, regions={}, bookmakers={}, useCache={}",
            self.hours_ahead,
            self.max_sports,
            self.max_events_per_sport,
            self.regions,
            self.bookmakers.join(","),
            self.use_cache
        )
    }

    /// Active sports, restricted by the sports filter, scoped to `max_sports`.
    pub fn select_sports(&self, sports: Vec<Sport>) -> Vec<Sport> {
        let eligible = sports
            .into_iter()
            .filter(|sport| sport.active)
            .filter(|sport| match &self.sports {
                Some(keys) => keys.iter().any(|key| key == &sport.key),
                None => true,
            })
            .collect();

        scope(eligible, self.max_sports)
    }
}

/// The first `limit` items, in their existing order.
pub fn scope<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    items.truncate(limit);
    items
}

/// `value` when finite and positive, `default` otherwise.
pub fn positive_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(default)
}

/// `value` floored to a count of at least one, `default` otherwise.
pub fn count_or(value: Option<f64>, default: usize) -> usize {
    match value.filter(|v| v.is_finite() && *v > 0.0) {
        Some(v) if v.floor() >= 1.0 => v.floor() as usize,
        _ => default,
    }
}

/// Parse a number, `None` when absent or unparseable.
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
}

/// Parse `true`/`false` (case-insensitive), `None` otherwise.
pub fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Split a comma-separated list, trimming and dropping blanks.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None`, blank or `all` select every sport; anything else is a key list.
pub fn parse_sports_filter(raw: Option<&str>) -> Option<Vec<String>> {
    match raw.map(str::trim) {
        None | Some("") => None,
        Some(value) if value.eq_ignore_ascii_case("all") => None,
        Some(value) => Some(parse_csv(value)),
    }
}
