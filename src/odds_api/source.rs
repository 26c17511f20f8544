//! Provider abstraction consumed by the snapshot pipelines.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::OddsApiError;

use super::types::{EventMarkets, EventSummary, FetchOptions, MarketQuery, OddsSnapshot, Sport};

/// The four upstream operations the pipelines fan out over.
///
/// Every event-level call takes the owning sport key.
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Fail fast when no credential is configured.
    fn check_credential(&self) -> Result<(), OddsApiError>;

    /// Current instant as seen by this source.
    fn now(&self) -> OffsetDateTime;

    /// Full sports list, unfiltered.
    async fn fetch_sports(&self, options: FetchOptions) -> Result<Vec<Sport>, OddsApiError>;

    /// Events for one sport starting within `hours_ahead` of now. Not sorted.
    async fn fetch_events_for_sport(
        &self,
        sport_key: &str,
        hours_ahead: f64,
        options: FetchOptions,
    ) -> Result<Vec<EventSummary>, OddsApiError>;

    /// Markets offered for one event, normalized across upstream shapes.
    async fn fetch_markets_for_event(
        &self,
        sport_key: &str,
        event_id: &str,
        query: &MarketQuery,
        options: FetchOptions,
    ) -> Result<EventMarkets, OddsApiError>;

    /// Odds for one event. Bypasses the cache unless `options.use_cache` is `Some(true)`.
    async fn fetch_odds_for_event(
        &self,
        sport_key: &str,
        event_id: &str,
        market_keys: &[String],
        query: &MarketQuery,
        options: FetchOptions,
    ) -> Result<OddsSnapshot, OddsApiError>;
}
