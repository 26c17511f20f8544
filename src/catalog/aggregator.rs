//! Market aggregation across a catalog crawl.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::instrument;

use crate::odds_api::types::EventMarkets;

/// Finalized view of one market across the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCatalogEntry {
    /// Sports the market was seen in, sorted.
    pub sports: Vec<String>,
    /// Bookmakers offering it, sorted.
    pub bookmakers: Vec<String>,
    /// Distinct events it was seen in.
    pub event_count: usize,
}

#[derive(Debug, Default)]
struct MarketAggregate {
    sports: BTreeSet<String>,
    bookmakers: BTreeSet<String>,
    event_ids: HashSet<String>,
}

/// Accumulates `market -> {sports, bookmakers, events}` while scanning.
///
/// Recording the same tuple twice leaves the aggregate unchanged.
#[derive(Debug, Default)]
pub struct MarketCatalogBuilder {
    requested_bookmakers: Vec<String>,
    markets: BTreeMap<String, MarketAggregate>,
}

impl MarketCatalogBuilder {
    /// Create a builder. `requested_bookmakers` are credited for markets
    /// that arrive without a bookmaker.
    pub fn new(requested_bookmakers: Vec<String>) -> Self {
        Self {
            requested_bookmakers,
            markets: BTreeMap::new(),
        }
    }

    /// Record one `(market, sport, event, bookmaker)` observation.
    ///
    /// Blank market keys are ignored.
    pub fn record(&mut self, market_key: &str, sport_key: &str, event_id: &str, bookmaker: Option<&str>) {
        if market_key.is_empty() {
            return;
        }

        let entry = self.markets.entry(market_key.to_string()).or_default();
        entry.sports.insert(sport_key.to_string());
        entry.event_ids.insert(event_id.to_string());

        match bookmaker {
            Some(bookmaker) => {
                entry.bookmakers.insert(bookmaker.to_string());
            }
            None => entry
                .bookmakers
                .extend(self.requested_bookmakers.iter().cloned()),
        }
    }

    /// Record every market of one scanned event.
    ///
    /// Grouped listings pair each market with its bookmaker; flat listings
    /// credit every requested bookmaker.
    #[instrument(skip(self, markets), fields(event_id = %markets.event_id))]
    pub fn record_event(&mut self, sport_key: &str, markets: &EventMarkets) {
        match markets.bookmaker_markets().filter(|groups| !groups.is_empty()) {
            Some(groups) => {
                for group in groups {
                    for market in &group.markets {
                        self.record(&market.key, sport_key, &markets.event_id, Some(group.key.as_str()));
                    }
                }
            }
            None => {
                for key in &markets.market_keys {
                    self.record(key, sport_key, &markets.event_id, None);
                }
            }
        }
    }

    /// Number of distinct markets seen so far.
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether no market has been recorded.
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Sort each aggregate and reduce event IDs to a count.
    pub fn finalize(self) -> BTreeMap<String, MarketCatalogEntry> {
        self.markets
            .into_iter()
            .map(|(key, aggregate)| {
                (
                    key,
                    MarketCatalogEntry {
                        sports: aggregate.sports.into_iter().collect(),
                        bookmakers: aggregate.bookmakers.into_iter().collect(),
                        event_count: aggregate.event_ids.len(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds_api::types::{MarketDefinition, MarketListing};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn requested() -> Vec<String> {
        vec!["fanduel".to_string(), "draftkings".to_string(), "novig".to_string()]
    }

    #[test]
    fn recording_the_same_tuple_twice_is_idempotent() {
        let mut builder = MarketCatalogBuilder::new(requested());
        builder.record("h2h", "basketball_nba", "E1", Some("fanduel"));
        builder.record("h2h", "basketball_nba", "E1", Some("fanduel"));

        let catalog = builder.finalize();

        assert_eq!(
            catalog["h2h"],
            MarketCatalogEntry {
                sports: vec!["basketball_nba".to_string()],
                bookmakers: vec!["fanduel".to_string()],
                event_count: 1,
            }
        );
    }

    #[test]
    fn grouped_listing_attributes_markets_to_their_bookmaker() {
        let listing = MarketListing::from_value(json!({
            "bookmakers": [
                {"key": "fanduel", "markets": [{"key": "h2h"}, {"key": "player_points"}]},
                {"key": "novig", "markets": [{"key": "h2h"}]}
            ]
        }))
        .unwrap();
        let mut builder = MarketCatalogBuilder::new(requested());
        builder.record_event("basketball_nba", &EventMarkets::from_listing("E1", listing));

        let catalog = builder.finalize();

        assert_eq!(catalog["h2h"].bookmakers, vec!["fanduel", "novig"]);
        assert_eq!(catalog["player_points"].bookmakers, vec!["fanduel"]);
    }

    #[test]
    fn flat_listing_credits_every_requested_bookmaker() {
        let listing = MarketListing::Flat(vec![MarketDefinition::new("totals")]);
        let mut builder = MarketCatalogBuilder::new(requested());
        builder.record_event("basketball_nba", &EventMarkets::from_listing("E1", listing));
        builder.record_event(
            "icehockey_nhl",
            &EventMarkets::from_listing("E2", MarketListing::Flat(vec![MarketDefinition::new("totals")])),
        );

        let catalog = builder.finalize();

        assert_eq!(
            catalog["totals"],
            MarketCatalogEntry {
                sports: vec!["basketball_nba".to_string(), "icehockey_nhl".to_string()],
                bookmakers: vec!["draftkings".to_string(), "fanduel".to_string(), "novig".to_string()],
                event_count: 2,
            }
        );
    }

    #[test]
    fn entries_serialize_with_camel_case_counts() {
        let mut builder = MarketCatalogBuilder::new(Vec::new());
        builder.record("h2h", "basketball_nba", "E1", Some("fanduel"));

        let value = serde_json::to_value(builder.finalize()).unwrap();

        assert_eq!(value["h2h"]["eventCount"], json!(1));
    }
}
