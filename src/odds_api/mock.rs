//! In-memory odds source for unit and integration testing.
//!
//! Serves canned sports, events, market listings and odds without making
//! network requests, and records every call so tests can assert on fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::error::OddsApiError;

use super::cache::{Clock, ManualClock};
use super::source::OddsSource;
use super::types::{
    filter_event_window, ApiEvent, EventMarkets, EventSummary, FetchOptions, MarketListing,
    MarketQuery, OddsSnapshot, Sport,
};

/// Configuration for mock source behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Report a missing credential.
    pub missing_credential: bool,
    /// Call label (e.g. `"odds:E2"`) that fails with an upstream 500.
    pub fail_on: Option<String>,
    /// Simulated upstream latency per call.
    pub latency: Option<Duration>,
}

/// One recorded upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Call label: `sports`, `events:<sport>`, `markets:<event>`, `odds:<event>`.
    pub label: String,
    /// Effective cache choice for the call.
    pub use_cache: Option<bool>,
    /// Market keys requested (odds calls only).
    pub market_keys: Vec<String>,
    /// Bookmaker filter sent (market and odds calls only).
    pub bookmakers: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    sports: Vec<Sport>,
    events: HashMap<String, Vec<ApiEvent>>,
    markets: HashMap<String, Value>,
    odds: HashMap<String, Value>,
    calls: Vec<RecordedCall>,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Mock odds source for testing.
#[derive(Debug, Clone)]
pub struct MockOddsSource {
    config: MockConfig,
    clock: Arc<ManualClock>,
    state: Arc<Mutex<MockState>>,
}

impl MockOddsSource {
    /// Create a mock frozen at `now`.
    pub fn new(now: OffsetDateTime) -> Self {
        Self::with_config(now, MockConfig::default())
    }

    /// Create a mock with custom configuration.
    pub fn with_config(now: OffsetDateTime, config: MockConfig) -> Self {
        Self {
            config,
            clock: Arc::new(ManualClock::new(now)),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Clock driving window filtering and timestamps.
    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Add a sport to the directory (upstream order is insertion order).
    pub fn add_sport(&self, sport: Sport) {
        self.state.lock().unwrap().sports.push(sport);
    }

    /// Set the raw events returned for a sport.
    pub fn set_events(&self, sport_key: &str, events: Vec<ApiEvent>) {
        self.state
            .lock()
            .unwrap()
            .events
            .insert(sport_key.to_string(), events);
    }

    /// Set the raw markets payload (flat array or grouped object) for an event.
    pub fn set_markets(&self, event_id: &str, payload: Value) {
        self.state
            .lock()
            .unwrap()
            .markets
            .insert(event_id.to_string(), payload);
    }

    /// Set the raw odds payload for an event.
    pub fn set_odds(&self, event_id: &str, payload: Value) {
        self.state
            .lock()
            .unwrap()
            .odds
            .insert(event_id.to_string(), payload);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Labels of calls made so far, in order.
    pub fn call_labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }

    /// Most calls observed in flight at once. Only tracked with `latency` set.
    pub fn peak_in_flight(&self) -> usize {
        self.state.lock().unwrap().peak_in_flight
    }

    /// Number of calls whose label starts with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.label.starts_with(prefix))
            .count()
    }

    fn record(&self, call: RecordedCall) -> Result<(), OddsApiError> {
        let failing = self.config.fail_on.as_deref() == Some(call.label.as_str());
        let label = call.label.clone();
        self.state.lock().unwrap().calls.push(call);

        if failing {
            return Err(OddsApiError::UpstreamHttp {
                path: label,
                status: 500,
                body: "mock upstream failure".to_string(),
            });
        }

        Ok(())
    }

    async fn simulate_latency(&self) {
        let Some(latency) = self.config.latency else {
            return;
        };
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        }
        tokio::time::sleep(latency).await;
        self.state.lock().unwrap().in_flight -= 1;
    }

    fn simple_call(label: String, options: FetchOptions) -> RecordedCall {
        RecordedCall {
            label,
            use_cache: options.use_cache,
            market_keys: Vec::new(),
            bookmakers: Vec::new(),
        }
    }

    /// Build a sport fixture.
    pub fn sport(key: &str, title: &str, active: bool) -> Sport {
        Sport {
            key: key.to_string(),
            group: title.to_string(),
            title: title.to_string(),
            description: None,
            active,
            has_outrights: Some(false),
        }
    }

    /// Build an event fixture with home/away fields.
    pub fn event(
        id: &str,
        sport_key: &str,
        start: OffsetDateTime,
        home: Option<&str>,
        away: Option<&str>,
    ) -> ApiEvent {
        ApiEvent {
            id: id.to_string(),
            sport_key: sport_key.to_string(),
            commence_time: super::types::format_iso(start),
            home_team: home.map(str::to_string),
            away_team: away.map(str::to_string),
            teams: Vec::new(),
        }
    }
}

#[async_trait]
impl OddsSource for MockOddsSource {
    fn check_credential(&self) -> Result<(), OddsApiError> {
        if self.config.missing_credential {
            Err(OddsApiError::MissingCredential)
        } else {
            Ok(())
        }
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    async fn fetch_sports(&self, options: FetchOptions) -> Result<Vec<Sport>, OddsApiError> {
        self.check_credential()?;
        self.record(Self::simple_call("sports".to_string(), options))?;
        self.simulate_latency().await;
        Ok(self.state.lock().unwrap().sports.clone())
    }

    async fn fetch_events_for_sport(
        &self,
        sport_key: &str,
        hours_ahead: f64,
        options: FetchOptions,
    ) -> Result<Vec<EventSummary>, OddsApiError> {
        self.check_credential()?;
        self.record(Self::simple_call(format!("events:{}", sport_key), options))?;
        self.simulate_latency().await;
        let events = self
            .state
            .lock()
            .unwrap()
            .events
            .get(sport_key)
            .cloned()
            .unwrap_or_default();
        Ok(filter_event_window(events, self.now(), hours_ahead))
    }

    async fn fetch_markets_for_event(
        &self,
        _sport_key: &str,
        event_id: &str,
        query: &MarketQuery,
        options: FetchOptions,
    ) -> Result<EventMarkets, OddsApiError> {
        self.check_credential()?;
        self.record(RecordedCall {
            label: format!("markets:{}", event_id),
            use_cache: options.use_cache,
            market_keys: Vec::new(),
            bookmakers: query.bookmakers.clone(),
        })?;
        self.simulate_latency().await;
        let payload = self
            .state
            .lock()
            .unwrap()
            .markets
            .get(event_id)
            .cloned()
            .unwrap_or_else(|| json!([]));
        let listing = MarketListing::from_value(payload).map_err(|reason| {
            OddsApiError::MalformedPayload {
                path: format!("markets:{}", event_id),
                reason,
            }
        })?;
        Ok(EventMarkets::from_listing(event_id, listing))
    }

    async fn fetch_odds_for_event(
        &self,
        _sport_key: &str,
        event_id: &str,
        market_keys: &[String],
        query: &MarketQuery,
        options: FetchOptions,
    ) -> Result<OddsSnapshot, OddsApiError> {
        self.check_credential()?;
        self.record(RecordedCall {
            label: format!("odds:{}", event_id),
            use_cache: Some(options.use_cache.unwrap_or(false)),
            market_keys: market_keys.to_vec(),
            bookmakers: query.bookmakers.clone(),
        })?;
        self.simulate_latency().await;
        let raw = self
            .state
            .lock()
            .unwrap()
            .odds
            .get(event_id)
            .cloned()
            .unwrap_or_else(|| json!({ "id": event_id, "bookmakers": [] }));

        Ok(OddsSnapshot {
            event_id: event_id.to_string(),
            markets: (!market_keys.is_empty()).then(|| market_keys.to_vec()),
            fetched_at: self.now(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[tokio::test]
    async fn mock_serves_sports_in_insertion_order() {
        let source = MockOddsSource::new(datetime!(2024-03-01 12:00 UTC));
        source.add_sport(MockOddsSource::sport("basketball_nba", "NBA", true));
        source.add_sport(MockOddsSource::sport("icehockey_nhl", "NHL", false));

        let sports = source.fetch_sports(FetchOptions::default()).await.unwrap();

        assert_eq!(sports.len(), 2);
        assert_eq!(sports[0].key, "basketball_nba");
        assert_eq!(source.call_labels(), vec!["sports"]);
    }

    #[tokio::test]
    async fn mock_filters_events_with_its_clock() {
        let now = datetime!(2024-03-01 12:00 UTC);
        let source = MockOddsSource::new(now);
        source.set_events(
            "basketball_nba",
            vec![
                MockOddsSource::event("E1", "basketball_nba", datetime!(2024-03-01 20:00 UTC), None, None),
                MockOddsSource::event("E2", "basketball_nba", datetime!(2024-03-10 20:00 UTC), None, None),
            ],
        );

        let events = source
            .fetch_events_for_sport("basketball_nba", 48.0, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, "E1");
    }

    #[tokio::test]
    async fn mock_failure_modes() {
        let config = MockConfig {
            missing_credential: true,
            ..Default::default()
        };
        let source = MockOddsSource::with_config(datetime!(2024-03-01 12:00 UTC), config);
        assert!(source.fetch_sports(FetchOptions::default()).await.is_err());

        let config = MockConfig {
            fail_on: Some("sports".to_string()),
            ..Default::default()
        };
        let source = MockOddsSource::with_config(datetime!(2024-03-01 12:00 UTC), config);
        let err = source.fetch_sports(FetchOptions::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
