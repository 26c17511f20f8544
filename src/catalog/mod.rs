//! Market catalog: crawl aggregation and static reference data.

pub mod aggregator;
pub mod definitions;

pub use aggregator::{MarketCatalogBuilder, MarketCatalogEntry};
pub use definitions::{
    bookmaker_regions, build_market_catalog, core_markets, format_market_catalog_log, BookmakerInfo,
    BookmakerRegion, MarketInfo, MarketSource, DEFAULT_SNAPSHOT_BOOKMAKERS,
    DEFAULT_SNAPSHOT_REGIONS, MARKET_CATALOG_LOG_FILENAME,
};
