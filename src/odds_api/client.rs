//! Odds API client with a memoizing fetch layer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::Config;
use crate::error::OddsApiError;
use crate::metrics;

use super::cache::{ResponseCache, SystemClock};
use super::source::OddsSource;
use super::types::{
    filter_event_window, ApiEvent, EventMarkets, EventSummary, FetchOptions, MarketListing,
    MarketQuery, OddsSnapshot, Sport,
};

/// Query parameter that carries the provider credential.
const API_KEY_PARAM: &str = "apiKey";

/// Build the canonical query string: parameters sorted by name, `None` values dropped.
///
/// The credential is never part of it.
pub fn canonical_query(params: &[(&str, Option<String>)]) -> String {
    let sorted: BTreeMap<&str, &str> = params
        .iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
        .collect();

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted)
        .finish()
}

/// Cache key for a request: `path?canonicalQuery`.
pub fn cache_key(path: &str, canonical: &str) -> String {
    format!("{}?{}", path, canonical)
}

/// The Odds API v4 client.
#[derive(Debug, Clone)]
pub struct OddsApiClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL, without trailing slash.
    base_url: String,
    /// Provider credential.
    api_key: Option<String>,
    /// Shared response cache.
    cache: ResponseCache,
    /// Default TTL for cached responses.
    default_ttl: Duration,
    /// Per-key locks so one key is fetched at most once per miss.
    in_flight: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl OddsApiClient {
    /// Create a client from config with a fresh cache on the wall clock.
    pub fn new(config: &Config) -> Result<Self, OddsApiError> {
        Self::with_cache(config, ResponseCache::new(Arc::new(SystemClock)))
    }

    /// Create a client that shares `cache` (and its clock).
    pub fn with_cache(config: &Config, cache: ResponseCache) -> Result<Self, OddsApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: config.odds_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.the_odds_api_key.clone(),
            cache,
            default_ttl: config.cache_ttl(),
            in_flight: Arc::new(DashMap::new()),
        })
    }

    /// Replace the credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Get the shared cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credential(&self) -> Result<&str, OddsApiError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(OddsApiError::MissingCredential)
    }

    /// GET `path` with `params`, memoized by request signature.
    ///
    /// `use_cache` defaults to true. Malformed payloads are never cached.
    #[instrument(skip(self, params, options), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, Option<String>)],
        options: FetchOptions,
    ) -> Result<T, OddsApiError> {
        let api_key = self.credential()?;
        let query = canonical_query(params);
        let key = cache_key(path, &query);
        let use_cache = options.use_cache.unwrap_or(true);
        let ttl = options.cache_ttl.unwrap_or(self.default_ttl);

        if !use_cache {
            let value = self.fetch_value(path, &query, api_key).await?;
            return decode(path, value);
        }

        if let Some(value) = self.cache.get(&key) {
            metrics::inc_cache_hits();
            debug!(cache_key = %key, "Cache hit");
            return decode(path, value);
        }

        let lock = Arc::clone(&self.in_flight.entry(key.clone()).or_default());
        let _guard = lock.lock().await;

        // Another task may have filled the entry while we waited.
        if let Some(value) = self.cache.get(&key) {
            metrics::inc_cache_hits();
            debug!(cache_key = %key, "Cache filled while waiting");
            return decode(path, value);
        }

        metrics::inc_cache_misses();
        let outcome = self.fetch_value(path, &query, api_key).await.and_then(|value| {
            let decoded = decode(path, value.clone())?;
            self.cache.set(key.clone(), value, ttl);
            Ok(decoded)
        });
        self.in_flight.remove(&key);

        outcome
    }

    /// Perform the network request and parse the body as JSON.
    async fn fetch_value(&self, path: &str, query: &str, api_key: &str) -> Result<Value, OddsApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        url.query_pairs_mut().append_pair(API_KEY_PARAM, api_key);

        let start = Instant::now();
        // `From<reqwest::Error>` drops the URL, and with it the credential.
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        metrics::record_upstream_latency(start, path);

        if !status.is_success() {
            metrics::inc_upstream_errors();
            return Err(OddsApiError::UpstreamHttp {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| OddsApiError::MalformedPayload {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, OddsApiError> {
    serde_json::from_value(value).map_err(|e| OddsApiError::MalformedPayload {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl OddsSource for OddsApiClient {
    fn check_credential(&self) -> Result<(), OddsApiError> {
        self.credential().map(|_| ())
    }

    fn now(&self) -> OffsetDateTime {
        self.cache.clock().now()
    }

    #[instrument(skip(self))]
    async fn fetch_sports(&self, options: FetchOptions) -> Result<Vec<Sport>, OddsApiError> {
        let sports: Vec<Sport> = self.get("/sports", &[], options).await?;

        info!(count = sports.len(), "Fetched sports from Odds API");

        Ok(sports)
    }

    #[instrument(skip(self))]
    async fn fetch_events_for_sport(
        &self,
        sport_key: &str,
        hours_ahead: f64,
        options: FetchOptions,
    ) -> Result<Vec<EventSummary>, OddsApiError> {
        let path = format!("/sports/{}/events", sport_key);
        let events: Vec<ApiEvent> = self.get(&path, &[], options).await?;
        let summaries = filter_event_window(events, self.now(), hours_ahead);

        info!(
            sport = %sport_key,
            count = summaries.len(),
            hours_ahead,
            "Fetched events in window"
        );

        Ok(summaries)
    }

    #[instrument(skip(self, query))]
    async fn fetch_markets_for_event(
        &self,
        sport_key: &str,
        event_id: &str,
        query: &MarketQuery,
        options: FetchOptions,
    ) -> Result<EventMarkets, OddsApiError> {
        let path = format!("/sports/{}/events/{}/markets", sport_key, event_id);
        let params = [
            ("regions", Some(query.regions.clone())),
            ("bookmakers", query.bookmaker_param()),
        ];
        let payload: Value = self.get(&path, &params, options).await?;
        let listing = MarketListing::from_value(payload)
            .map_err(|reason| OddsApiError::MalformedPayload { path, reason })?;
        let markets = EventMarkets::from_listing(event_id, listing);

        info!(
            sport = %sport_key,
            event_id = %event_id,
            markets = markets.market_keys.len(),
            bookmakers_observed = markets.bookmaker_markets().map_or(0, |b| b.len()),
            "Fetched markets for event"
        );

        Ok(markets)
    }

    #[instrument(skip(self, market_keys, query))]
    async fn fetch_odds_for_event(
        &self,
        sport_key: &str,
        event_id: &str,
        market_keys: &[String],
        query: &MarketQuery,
        options: FetchOptions,
    ) -> Result<OddsSnapshot, OddsApiError> {
        let path = format!("/sports/{}/events/{}/odds", sport_key, event_id);
        let market_param = (!market_keys.is_empty()).then(|| market_keys.join(","));
        let params = [
            ("markets", market_param),
            ("regions", Some(query.regions.clone())),
            ("bookmakers", query.bookmaker_param()),
        ];
        // Odds are time-sensitive: bypass the cache unless the caller insists.
        let options = FetchOptions {
            use_cache: Some(options.use_cache.unwrap_or(false)),
            ..options
        };
        let raw: Value = self.get(&path, &params, options).await?;
        let fetched_at = self.now();
        let requested = if market_keys.is_empty() {
            "all available".to_string()
        } else {
            market_keys.join(", ")
        };

        info!(
            sport = %sport_key,
            event_id = %event_id,
            markets = %requested,
            "Fetched odds for event"
        );

        Ok(OddsSnapshot {
            event_id: event_id.to_string(),
            markets: (!market_keys.is_empty()).then(|| market_keys.to_vec()),
            fetched_at,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds_api::cache::ManualClock;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use time::macros::datetime;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> Config {
        Config {
            the_odds_api_key: Some("secret-key".to_string()),
            odds_api_base_url: server.uri(),
            ..Config::default()
        }
    }

    fn client_with_clock(server: &MockServer) -> (OddsApiClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 12:00 UTC)));
        let cache = ResponseCache::new(clock.clone());
        let client = OddsApiClient::with_cache(&test_config(server), cache).unwrap();
        (client, clock)
    }

    fn sports_body() -> Value {
        json!([
            {"key": "basketball_nba", "group": "Basketball", "title": "NBA", "active": true, "has_outrights": false},
            {"key": "icehockey_nhl", "group": "Ice Hockey", "title": "NHL", "active": false}
        ])
    }

    #[test]
    fn canonical_query_is_sorted_and_drops_missing_values() {
        let a = canonical_query(&[
            ("regions", Some("us,us_ex".to_string())),
            ("bookmakers", None),
            ("markets", Some("h2h".to_string())),
        ]);
        let b = canonical_query(&[
            ("markets", Some("h2h".to_string())),
            ("regions", Some("us,us_ex".to_string())),
        ]);

        assert_eq!(a, b);
        assert_eq!(a, "markets=h2h&regions=us%2Cus_ex");
    }

    #[test]
    fn cache_key_never_contains_credential() {
        let key = cache_key("/sports", &canonical_query(&[("regions", Some("us".to_string()))]));
        assert_eq!(key, "/sports?regions=us");
        assert!(!key.contains(API_KEY_PARAM));
    }

    #[tokio::test]
    async fn cached_call_within_ttl_hits_upstream_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports"))
            .and(query_param("apiKey", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sports_body()))
            .expect(1)
            .mount(&server)
            .await;

        let (client, clock) = client_with_clock(&server);

        let first = client.fetch_sports(FetchOptions::default()).await.unwrap();
        clock.advance(Duration::from_secs(599));
        let second = client.fetch_sports(FetchOptions::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0].active);
    }

    #[tokio::test]
    async fn cached_call_after_ttl_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sports_body()))
            .expect(2)
            .mount(&server)
            .await;

        let (client, clock) = client_with_clock(&server);

        client.fetch_sports(FetchOptions::default()).await.unwrap();
        clock.advance(Duration::from_secs(600));
        client.fetch_sports(FetchOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_cached_calls_share_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sports_body())
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);

        let (a, b) = tokio::join!(
            client.fetch_sports(FetchOptions::default()),
            client.fetch_sports(FetchOptions::default()),
        );

        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn non_success_status_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);
        let err = client.fetch_sports(FetchOptions::default()).await.unwrap_err();

        match err {
            OddsApiError::UpstreamHttp { status, body, path } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
                assert_eq!(path, "/sports");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.cache().is_empty());
        assert!(client.in_flight.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);
        let err = client.fetch_sports(FetchOptions::default()).await.unwrap_err();

        assert!(matches!(err, OddsApiError::MalformedPayload { .. }));
        assert!(client.cache().is_empty());
        assert!(client.in_flight.is_empty());
    }

    #[tokio::test]
    async fn transport_error_never_exposes_credential() {
        let config = Config {
            the_odds_api_key: Some("do-not-leak-this-key".to_string()),
            odds_api_base_url: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        };
        let client = OddsApiClient::new(&config).unwrap();

        let err = client.fetch_sports(FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, OddsApiError::Transport(_)));
        assert!(client.in_flight.is_empty());

        let err = crate::error::SnapshotError::from(err);
        let rendered = format!("{} | {:?}", err, err);
        assert!(rendered.starts_with("http request failed"), "{rendered}");
        assert!(!rendered.contains("do-not-leak-this-key"), "{rendered}");
        assert!(!rendered.contains(API_KEY_PARAM), "{rendered}");
    }

    #[tokio::test]
    async fn missing_credential_fails_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let config = Config {
            the_odds_api_key: None,
            odds_api_base_url: server.uri(),
            ..Config::default()
        };
        let client = OddsApiClient::new(&config).unwrap();

        let err = client.fetch_sports(FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, OddsApiError::MissingCredential));
        assert!(client.check_credential().is_err());
    }

    #[tokio::test]
    async fn events_are_filtered_to_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "E1", "sport_key": "basketball_nba", "commence_time": "2024-03-01T18:00:00Z",
                 "home_team": "Lakers", "away_team": "Celtics"},
                {"id": "E2", "sport_key": "basketball_nba", "commence_time": "2024-03-05T18:00:00Z"}
            ])))
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);
        let events = client
            .fetch_events_for_sport("basketball_nba", 48.0, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, "E1");
        assert_eq!(events[0].home_team.as_deref(), Some("Lakers"));
    }

    #[tokio::test]
    async fn markets_request_sends_filters_and_normalizes_grouped_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/events/E1/markets"))
            .and(query_param("regions", "us"))
            .and(query_param("bookmakers", "fanduel,draftkings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "E1",
                "bookmakers": [
                    {"key": "fanduel", "markets": [{"key": "h2h"}, {"key": "totals"}]},
                    {"key": "draftkings", "markets": [{"key": "h2h"}]}
                ]
            })))
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);
        let query = MarketQuery {
            regions: "us".to_string(),
            bookmakers: vec!["fanduel".to_string(), "draftkings".to_string()],
        };
        let markets = client
            .fetch_markets_for_event("basketball_nba", "E1", &query, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(markets.market_keys, vec!["h2h", "totals"]);
        assert_eq!(markets.bookmaker_markets().map(|b| b.len()), Some(2));
    }

    #[tokio::test]
    async fn odds_bypass_cache_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/events/E1/odds"))
            .and(query_param("markets", "h2h,totals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "E1", "bookmakers": []})))
            .expect(2)
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);
        let keys = vec!["h2h".to_string(), "totals".to_string()];

        let first = client
            .fetch_odds_for_event("basketball_nba", "E1", &keys, &MarketQuery::default(), FetchOptions::default())
            .await
            .unwrap();
        client
            .fetch_odds_for_event("basketball_nba", "E1", &keys, &MarketQuery::default(), FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(first.markets, Some(keys));
        assert_eq!(first.fetched_at, datetime!(2024-03-01 12:00 UTC));
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn odds_with_no_market_keys_omit_markets_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/events/E1/odds"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let (client, _) = client_with_clock(&server);
        let snapshot = client
            .fetch_odds_for_event("basketball_nba", "E1", &[], &MarketQuery::default(), FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(snapshot.markets, None);
        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].url.query().unwrap_or_default().contains("markets="));
    }
}
