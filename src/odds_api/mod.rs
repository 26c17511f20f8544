//! Odds API access layer.
//!
//! This module handles:
//! - The memoizing fetch client for The Odds API v4
//! - The response cache and its injectable clock
//! - Upstream payload types and shape normalization
//! - The `OddsSource` seam and an in-memory mock for testing

pub mod cache;
pub mod client;
pub mod mock;
pub mod source;
pub mod types;

pub use cache::{CacheEntry, Clock, ManualClock, ResponseCache, SystemClock};
pub use client::OddsApiClient;
pub use mock::{MockConfig, MockOddsSource, RecordedCall};
pub use source::OddsSource;
pub use types::{
    ApiEvent, BookmakerMarketGroup, EventMarkets, EventSummary, FetchOptions, MarketDefinition,
    MarketListing, MarketQuery, OddsSnapshot, Sport,
};
