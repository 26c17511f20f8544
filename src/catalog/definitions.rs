//! Static market and bookmaker reference data, and the market catalog log.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use time::OffsetDateTime;

use crate::odds_api::types::{format_iso, MarketDefinition};

/// Fixed file name of the market catalog log.
pub const MARKET_CATALOG_LOG_FILENAME: &str = "LatestMarketsCatalog.log";

/// Note attached to every discovered (non-core) market.
pub const ADDITIONAL_MARKETS_SOURCE_NOTE: &str =
    "Additional markets are retrieved with a one-time call to /events/{eventId}/odds using the additional_markets selector.";

const ADDITIONAL_MARKET_DESCRIPTION: &str =
    "Additional market fetched from Odds API additional_markets payload.";

const EXCHANGE_NOTE: &str = "Applicable to betting exchanges.";

/// Regions requested by the snapshot pipelines by default.
pub const DEFAULT_SNAPSHOT_REGIONS: [&str; 2] = ["us", "us_ex"];

/// Bookmakers requested by the snapshot pipelines by default.
pub const DEFAULT_SNAPSHOT_BOOKMAKERS: [&str; 3] = ["draftkings", "fanduel", "novig"];

/// Where a catalog entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarketSource {
    /// Documented core market.
    Core,
    /// Market discovered from an upstream payload.
    Additional,
}

/// One market catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketInfo {
    /// Market key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Entry origin.
    pub source: MarketSource,
    /// Optional note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

const CORE_MARKETS: [(&str, &str, &str, Option<&str>); 6] = [
    (
        "h2h",
        "Head to head / Moneyline",
        "Bet on the winning team or player of a game (includes the draw for soccer).",
        None,
    ),
    (
        "spreads",
        "Points spread / Handicap",
        "Bet on the winning team after a points handicap has been applied to each team.",
        None,
    ),
    (
        "totals",
        "Total points / Over-Under",
        "Bet on the total score of the game being above or below a threshold.",
        None,
    ),
    (
        "outrights",
        "Outrights / Futures",
        "Bet on a final outcome of a tournament or competition.",
        None,
    ),
    (
        "h2h_lay",
        "Head to head lay",
        "Bet against a head to head outcome (betting exchange only).",
        Some(EXCHANGE_NOTE),
    ),
    (
        "outrights_lay",
        "Outrights lay",
        "Bet against an outrights outcome (betting exchange only).",
        Some(EXCHANGE_NOTE),
    ),
];

/// The documented core markets, in reference order.
pub fn core_markets() -> Vec<MarketInfo> {
    CORE_MARKETS
        .iter()
        .map(|(key, name, description, notes)| MarketInfo {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            source: MarketSource::Core,
            notes: notes.map(str::to_string),
        })
        .collect()
}

/// `player_pass_tds` becomes `Player Pass Tds`.
pub fn market_name_from_key(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Core markets plus every discovered market not already present.
///
/// Core entries are never overridden. Blank keys are skipped.
pub fn build_market_catalog(additional: &[MarketDefinition]) -> Vec<MarketInfo> {
    let mut catalog = core_markets();

    for market in additional {
        let key = market.key.trim();
        if key.is_empty() || catalog.iter().any(|entry| entry.key == key) {
            continue;
        }

        catalog.push(MarketInfo {
            key: key.to_string(),
            name: market_name_from_key(key),
            description: ADDITIONAL_MARKET_DESCRIPTION.to_string(),
            source: MarketSource::Additional,
            notes: Some(ADDITIONAL_MARKETS_SOURCE_NOTE.to_string()),
        });
    }

    catalog
}

/// Render `LatestMarketsCatalog.log`, entries sorted by key.
pub fn format_market_catalog_log(
    catalog: &[MarketInfo],
    generated_at: OffsetDateTime,
    source_description: Option<&str>,
) -> String {
    let mut sorted: Vec<&MarketInfo> = catalog.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let core = sorted.iter().filter(|m| m.source == MarketSource::Core).count();
    let additional = sorted.len() - core;

    let mut lines = vec![format!("Market catalog generated at {}", format_iso(generated_at))];
    if let Some(source) = source_description {
        lines.push(format!("Source: {}", source));
    }
    lines.push(format!("Total markets: {}", sorted.len()));
    lines.push(format!("- Core markets: {}", core));
    lines.push(format!("- Additional markets: {}", additional));
    lines.push(String::new());
    lines.push("Markets:".to_string());

    for (index, market) in sorted.iter().enumerate() {
        lines.push(format!("{}. {} :: {}", index + 1, market.key, market.name));
        lines.push(format!("    Description: {}", market.description));
        match &market.notes {
            Some(notes) => lines.push(format!("    Source: {} ({})", market.source, notes)),
            None => lines.push(format!("    Source: {}", market.source)),
        }
    }

    lines.join("\n")
}

/// Bookmaker regions known to the provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum BookmakerRegion {
    /// United States.
    Us,
    /// United States, second tier.
    #[strum(serialize = "us2")]
    Us2,
    /// United States daily fantasy.
    UsDfs,
    /// United States exchanges.
    UsEx,
}

/// One bookmaker in the region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookmakerInfo {
    /// Provider key.
    pub key: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Availability note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

const fn bookmaker(key: &'static str, name: &'static str) -> BookmakerInfo {
    BookmakerInfo {
        key,
        name,
        note: None,
    }
}

const fn noted(key: &'static str, name: &'static str, note: &'static str) -> BookmakerInfo {
    BookmakerInfo {
        key,
        name,
        note: Some(note),
    }
}

const PAID_ONLY: &str = "Only available on paid subscriptions";
const ALT_MULTIPLIERS: &str =
    "Selections with non-default multipliers are included in alternate markets";

const US: [BookmakerInfo; 11] = [
    bookmaker("betonlineag", "BetOnline.ag"),
    bookmaker("betmgm", "BetMGM"),
    bookmaker("betrivers", "BetRivers"),
    bookmaker("betus", "BetUS"),
    bookmaker("bovada", "Bovada"),
    noted("williamhill_us", "Caesars", PAID_ONLY),
    bookmaker("draftkings", "DraftKings"),
    noted("fanatics", "Fanatics", PAID_ONLY),
    bookmaker("fanduel", "FanDuel"),
    bookmaker("lowvig", "LowVig.ag"),
    bookmaker("mybookieag", "MyBookie.ag"),
];

const US2: [BookmakerInfo; 7] = [
    bookmaker("ballybet", "Bally Bet"),
    noted("betanysports", "BetAnything", "Formerly BetAnySports"),
    bookmaker("betparx", "betPARX"),
    bookmaker("espnbet", "ESPN BET"),
    bookmaker("fliff", "Fliff"),
    bookmaker("hardrockbet", "Hard Rock Bet"),
    noted("rebet", "ReBet", PAID_ONLY),
];

const US_DFS: [BookmakerInfo; 4] = [
    noted("betr_us_dfs", "Betr Picks", ALT_MULTIPLIERS),
    noted("pick6", "DraftKings Pick6", ALT_MULTIPLIERS),
    noted(
        "prizepicks",
        "PrizePicks",
        "Alternate market odds may use default assumptions",
    ),
    noted("underdog", "Underdog Fantasy", ALT_MULTIPLIERS),
];

const US_EX: [BookmakerInfo; 4] = [
    noted(
        "betopenly",
        "BetOpenly",
        "Use the \"includeBetLimits\" parameter to find open bets",
    ),
    bookmaker("kalshi", "Kalshi"),
    bookmaker("novig", "Novig"),
    bookmaker("prophetx", "ProphetX"),
];

impl BookmakerRegion {
    /// Bookmakers listed for this region.
    pub fn bookmakers(self) -> &'static [BookmakerInfo] {
        match self {
            BookmakerRegion::Us => &US,
            BookmakerRegion::Us2 => &US2,
            BookmakerRegion::UsDfs => &US_DFS,
            BookmakerRegion::UsEx => &US_EX,
        }
    }
}

/// The full region table, keyed by region name.
pub fn bookmaker_regions() -> BTreeMap<&'static str, &'static [BookmakerInfo]> {
    use strum::IntoEnumIterator;

    BookmakerRegion::iter()
        .map(|region| (region.into(), region.bookmakers()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use time::macros::datetime;

    #[test]
    fn market_names_are_title_cased_from_keys() {
        assert_eq!(market_name_from_key("player_pass_tds"), "Player Pass Tds");
        assert_eq!(market_name_from_key("alternate__spreads"), "Alternate Spreads");
    }

    #[test]
    fn catalog_keeps_core_entries_and_appends_new_keys() {
        let discovered = vec![
            MarketDefinition::new("h2h"),
            MarketDefinition::new("player_points"),
            MarketDefinition::new("player_points"),
            MarketDefinition::new(" "),
        ];

        let catalog = build_market_catalog(&discovered);

        assert_eq!(catalog.len(), 7);
        let h2h = catalog.iter().find(|m| m.key == "h2h").unwrap();
        assert_eq!(h2h.source, MarketSource::Core);
        assert_eq!(h2h.name, "Head to head / Moneyline");
        let points = catalog.iter().find(|m| m.key == "player_points").unwrap();
        assert_eq!(points.source, MarketSource::Additional);
        assert_eq!(points.name, "Player Points");
    }

    #[test]
    fn catalog_log_lists_markets_sorted_with_counts() {
        let catalog = build_market_catalog(&[MarketDefinition::new("alternate_totals")]);
        let log = format_market_catalog_log(
            &catalog,
            datetime!(2024-03-01 12:00 UTC),
            Some("Markets for sport basketball_nba event E1 (regions=us)"),
        );
        let lines: Vec<&str> = log.lines().collect();

        assert_eq!(lines[0], "Market catalog generated at 2024-03-01T12:00:00Z");
        assert_eq!(lines[1], "Source: Markets for sport basketball_nba event E1 (regions=us)");
        assert_eq!(lines[2], "Total markets: 7");
        assert_eq!(lines[3], "- Core markets: 6");
        assert_eq!(lines[4], "- Additional markets: 1");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Markets:");
        assert_eq!(lines[7], "1. alternate_totals :: Alternate Totals");
        assert!(log.contains("2. h2h :: Head to head / Moneyline\n    Description: Bet on the winning team"));
        assert!(log.contains("    Source: core (Applicable to betting exchanges.)"));
    }

    #[test]
    fn region_table_covers_every_region() {
        let regions = bookmaker_regions();
        assert_eq!(regions.len(), 4);
        assert!(regions["us_ex"].iter().any(|b| b.key == "novig"));
        assert_eq!(BookmakerRegion::from_str("us_dfs").unwrap(), BookmakerRegion::UsDfs);

        for key in DEFAULT_SNAPSHOT_BOOKMAKERS {
            assert!(regions.values().any(|books| books.iter().any(|b| b.key == key)));
        }
    }
}
