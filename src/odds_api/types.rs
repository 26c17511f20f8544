//! Upstream payload types and their normalized internal shapes.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

/// One upstream sport/league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sport {
    /// Sport key (e.g., "basketball_nba").
    pub key: String,
    /// Sport group (e.g., "Basketball").
    #[serde(default)]
    pub group: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Optional long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the sport is in season.
    #[serde(default)]
    pub active: bool,
    /// Whether outright markets are offered.
    #[serde(default, alias = "hasOutrights")]
    pub has_outrights: Option<bool>,
}

/// Raw event as returned by `/sports/{sport}/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEvent {
    /// Event ID.
    pub id: String,
    /// Owning sport key.
    #[serde(default)]
    pub sport_key: String,
    /// Start time (ISO-8601).
    pub commence_time: String,
    /// Home team, when provided.
    #[serde(default)]
    pub home_team: Option<String>,
    /// Away team, when provided.
    #[serde(default)]
    pub away_team: Option<String>,
    /// Team list, when provided.
    #[serde(default)]
    pub teams: Vec<String>,
}

/// One scheduled event, mapped into the internal shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// Event ID.
    pub event_id: String,
    /// Owning sport key.
    pub sport_key: String,
    /// Raw team list as sent upstream.
    pub teams: Vec<String>,
    /// Raw home team.
    pub home_team: Option<String>,
    /// Raw away team.
    pub away_team: Option<String>,
    /// Parsed start time.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
}

impl EventSummary {
    /// Start time formatted as RFC 3339.
    pub fn start_time_iso(&self) -> String {
        format_iso(self.start_time)
    }
}

/// Format an instant as RFC 3339, the format used in every log artifact.
pub fn format_iso(instant: OffsetDateTime) -> String {
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

/// Keep events whose start lies in `[now, now + hours_ahead]`, both ends inclusive.
///
/// Events with an unparseable start time are dropped. Upstream order is kept.
/// A window too large to represent has no upper bound.
pub fn filter_event_window(
    events: Vec<ApiEvent>,
    now: OffsetDateTime,
    hours_ahead: f64,
) -> Vec<EventSummary> {
    let cutoff = window_cutoff(now, hours_ahead);

    events
        .into_iter()
        .filter_map(|event| {
            let start = match OffsetDateTime::parse(&event.commence_time, &Rfc3339) {
                Ok(start) => start,
                Err(e) => {
                    debug!(event_id = %event.id, error = %e, "Skipping event with unparseable start time");
                    return None;
                }
            };

            if start < now || cutoff.is_some_and(|cutoff| start > cutoff) {
                return None;
            }

            Some(EventSummary {
                event_id: event.id,
                sport_key: event.sport_key,
                teams: event.teams,
                home_team: event.home_team,
                away_team: event.away_team,
                start_time: start,
            })
        })
        .collect()
}

/// `now + hours_ahead`, or `None` when the sum overflows.
fn window_cutoff(now: OffsetDateTime, hours_ahead: f64) -> Option<OffsetDateTime> {
    let span = Duration::try_from_secs_f64(hours_ahead.max(0.0) * 3600.0).ok()?;
    let span = time::Duration::try_from(span).ok()?;
    now.checked_add(span)
}

/// One market offered for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDefinition {
    /// Market key (e.g., "h2h", "player_points").
    #[serde(default)]
    pub key: String,
    /// Last update timestamp, when provided.
    #[serde(default, alias = "lastUpdate", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    /// Outcome objects, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<Vec<Value>>,
}

impl MarketDefinition {
    /// Build a bare market definition.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            last_update: None,
            outcomes: None,
        }
    }

    /// Attach outcome objects.
    pub fn with_outcomes(mut self, outcomes: Vec<Value>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }
}

/// One bookmaker's markets for an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmakerMarketGroup {
    /// Bookmaker key.
    pub key: String,
    /// Bookmaker title, when provided.
    pub title: Option<String>,
    /// Markets listed under this bookmaker.
    pub markets: Vec<MarketDefinition>,
}

/// Wire shape of one bookmaker entry in the grouped response.
#[derive(Debug, Deserialize)]
struct RawBookmaker {
    #[serde(default)]
    key: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    markets: Option<Vec<MarketDefinition>>,
}

/// Wire shape of the grouped response.
#[derive(Debug, Deserialize)]
struct RawGrouped {
    #[serde(default)]
    bookmakers: Option<Vec<Option<RawBookmaker>>>,
}

/// Market listing, normalized right after the fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum MarketListing {
    /// Flat array of market definitions.
    Flat(Vec<MarketDefinition>),
    /// Markets nested under each bookmaker.
    Grouped(Vec<BookmakerMarketGroup>),
}

impl MarketListing {
    /// Detect the upstream shape of a markets payload.
    ///
    /// An array is the flat shape. An object is the grouped shape; bookmaker
    /// entries without a `markets` array are dropped. An object without a
    /// `bookmakers` array yields an empty flat listing.
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Array(_) => serde_json::from_value::<Vec<MarketDefinition>>(value)
                .map(MarketListing::Flat)
                .map_err(|e| e.to_string()),
            Value::Object(_) => {
                let raw: RawGrouped = serde_json::from_value(value).map_err(|e| e.to_string())?;
                match raw.bookmakers {
                    Some(bookmakers) => Ok(MarketListing::Grouped(
                        bookmakers
                            .into_iter()
                            .flatten()
                            .filter_map(|b| {
                                Some(BookmakerMarketGroup {
                                    key: b.key,
                                    title: b.title,
                                    markets: b.markets?,
                                })
                            })
                            .collect(),
                    )),
                    None => Ok(MarketListing::Flat(Vec::new())),
                }
            }
            other => Err(format!("expected array or object, got {}", json_kind(&other))),
        }
    }

    /// All market definitions, bookmaker groups flattened in order.
    pub fn combined(&self) -> Vec<MarketDefinition> {
        match self {
            MarketListing::Flat(markets) => markets.clone(),
            MarketListing::Grouped(groups) => groups
                .iter()
                .flat_map(|group| group.markets.iter().cloned())
                .collect(),
        }
    }

    /// Per-bookmaker breakdown, present only for the grouped shape.
    pub fn bookmaker_groups(&self) -> Option<&[BookmakerMarketGroup]> {
        match self {
            MarketListing::Flat(_) => None,
            MarketListing::Grouped(groups) => Some(groups),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Unique, non-empty market keys in order of first appearance.
pub fn unique_market_keys(markets: &[MarketDefinition]) -> Vec<String> {
    let mut seen = HashSet::new();
    markets
        .iter()
        .map(|market| market.key.trim())
        .filter(|key| !key.is_empty())
        .filter(|key| seen.insert(key.to_string()))
        .map(str::to_string)
        .collect()
}

/// Resolved markets for one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMarkets {
    /// Event ID.
    pub event_id: String,
    /// Deduplicated market keys.
    pub market_keys: Vec<String>,
    /// Combined list of market definitions.
    pub raw_markets: Vec<MarketDefinition>,
    /// Normalized listing as returned upstream.
    pub listing: MarketListing,
}

impl EventMarkets {
    /// Normalize a listing into the resolved market set.
    pub fn from_listing(event_id: impl Into<String>, listing: MarketListing) -> Self {
        let raw_markets = listing.combined();
        let market_keys = unique_market_keys(&raw_markets);

        Self {
            event_id: event_id.into(),
            market_keys,
            raw_markets,
            listing,
        }
    }

    /// Per-bookmaker breakdown, if upstream returned the grouped shape.
    pub fn bookmaker_markets(&self) -> Option<&[BookmakerMarketGroup]> {
        self.listing.bookmaker_groups()
    }
}

/// Point-in-time odds payload for an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OddsSnapshot {
    /// Event ID.
    pub event_id: String,
    /// Requested market keys; `None` means all markets.
    pub markets: Option<Vec<String>>,
    /// Fetch completion instant.
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    /// Raw odds payload.
    pub raw: Value,
}

/// Per-call cache controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Use the response cache. `None` takes the endpoint default.
    pub use_cache: Option<bool>,
    /// Override the cache TTL.
    pub cache_ttl: Option<Duration>,
}

impl FetchOptions {
    /// Options with an explicit cache choice.
    pub fn cached(use_cache: bool) -> Self {
        Self {
            use_cache: Some(use_cache),
            cache_ttl: None,
        }
    }
}

/// Region and bookmaker filters for market and odds requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketQuery {
    /// Comma-separated regions.
    pub regions: String,
    /// Bookmaker keys.
    pub bookmakers: Vec<String>,
}

impl Default for MarketQuery {
    fn default() -> Self {
        Self {
            regions: "us".to_string(),
            bookmakers: Vec::new(),
        }
    }
}

impl MarketQuery {
    /// Comma-joined bookmaker filter, `None` when no non-blank key is set.
    pub fn bookmaker_param(&self) -> Option<String> {
        let joined = self
            .bookmakers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join(",");

        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}
