//! End-to-end tests for the snapshot pipelines.
//!
//! Most tests run against the in-memory source or a local wiremock server.
//! The live test needs THE_ODDS_API_KEY and spends quota.
//! Run it with: cargo test --test integration -- --ignored

use std::sync::Arc;
use std::time::Duration;

use odds_snapshot::config::Config;
use odds_snapshot::odds_api::{ApiEvent, MockOddsSource, OddsApiClient};
use odds_snapshot::snapshot::{
    parse_market_snapshot_log, FileSink, MemorySink, SnapshotKind, SnapshotOptions,
    SnapshotRunner,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use time::macros::datetime;
use time::OffsetDateTime;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

fn mock_runner(source: &MockOddsSource) -> (SnapshotRunner, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let runner = SnapshotRunner::new(Arc::new(source.clone()), sink.clone(), 1);
    (runner, sink)
}

fn five_events(sport_key: &str) -> Vec<ApiEvent> {
    (1..=5)
        .map(|i| {
            MockOddsSource::event(
                &format!("E{}", i),
                sport_key,
                NOW + time::Duration::hours(i),
                Some(&format!("Home {}", i)),
                Some(&format!("Away {}", i)),
            )
        })
        .collect()
}

#[tokio::test]
async fn max_sports_limits_sports_checked() {
    let source = MockOddsSource::new(NOW);
    source.add_sport(MockOddsSource::sport("basketball_nba", "NBA", true));
    source.add_sport(MockOddsSource::sport("icehockey_nhl", "NHL", true));
    source.set_events("basketball_nba", five_events("basketball_nba"));
    let (runner, _) = mock_runner(&source);

    let options = SnapshotOptions {
        max_sports: Some(1.0),
        ..Default::default()
    };
    let result = assert_ok!(runner.run_market_snapshot(&options).await);

    assert_eq!(result.sports_checked, 1);
    assert_eq!(source.count_calls("events:"), 1);
}

#[tokio::test]
async fn max_events_per_sport_limits_events_captured() {
    let source = MockOddsSource::new(NOW);
    source.add_sport(MockOddsSource::sport("basketball_nba", "NBA", true));
    source.set_events("basketball_nba", five_events("basketball_nba"));
    let (runner, _) = mock_runner(&source);

    let options = SnapshotOptions {
        max_events_per_sport: Some(3.0),
        ..Default::default()
    };
    let result = assert_ok!(runner.run_market_snapshot(&options).await);

    assert_eq!(result.events_captured, 3);
    assert_eq!(source.count_calls("markets:"), 3);
    assert_eq!(source.count_calls("odds:"), 3);
    let ids: Vec<_> = result.entries.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["E1", "E2", "E3"]);
}

#[tokio::test]
async fn sport_without_events_is_a_warning_not_a_failure() {
    let source = MockOddsSource::new(NOW);
    source.add_sport(MockOddsSource::sport("icehockey_nhl", "NHL", true));
    let (runner, sink) = mock_runner(&source);

    let result = assert_ok!(runner.run_team_names_snapshot(&SnapshotOptions::default()).await);

    assert_eq!(
        result.warnings,
        vec!["No events found for sport icehockey_nhl within the next 48 hours."]
    );
    assert!(result.teams_by_sport.is_empty());
    let log = sink.last(SnapshotKind::TeamNames).unwrap();
    assert!(log.contains("Warnings:\n  1. No events found for sport icehockey_nhl"));
}

#[tokio::test]
async fn concurrent_fan_out_keeps_entry_order() {
    let source = MockOddsSource::new(NOW);
    source.add_sport(MockOddsSource::sport("basketball_nba", "NBA", true));
    source.add_sport(MockOddsSource::sport("baseball_mlb", "MLB", true));
    source.set_events("basketball_nba", five_events("basketball_nba"));
    source.set_events(
        "baseball_mlb",
        vec![MockOddsSource::event("M1", "baseball_mlb", NOW + time::Duration::hours(1), None, None)],
    );
    let sequential = SnapshotRunner::new(Arc::new(source.clone()), Arc::new(MemorySink::new()), 1);
    let concurrent = SnapshotRunner::new(Arc::new(source.clone()), Arc::new(MemorySink::new()), 4);

    let a = assert_ok!(sequential.run_market_snapshot(&SnapshotOptions::default()).await);
    let b = assert_ok!(concurrent.run_market_snapshot(&SnapshotOptions::default()).await);

    assert_eq!(a.entries, b.entries);
    assert_eq!(b.entries.last().map(|e| e.event_id.as_str()), Some("M1"));
}

#[tokio::test]
async fn market_log_on_disk_parses_back() {
    let source = MockOddsSource::new(NOW);
    source.add_sport(MockOddsSource::sport("basketball_nba", "NBA", true));
    source.set_events(
        "basketball_nba",
        vec![MockOddsSource::event("E1", "basketball_nba", NOW + time::Duration::hours(2), Some("Lakers"), Some("Celtics"))],
    );
    source.set_markets("E1", json!([{"key": "h2h"}, {"key": "player_points"}]));
    source.set_odds(
        "E1",
        json!({
            "id": "E1",
            "bookmakers": [{"key": "fanduel", "markets": [{"key": "player_points", "outcomes": [
                {"name": "Over", "description": "LeBron James", "price": -110},
                {"name": "Under", "description": "LeBron James", "price": -110}
            ]}]}]
        }),
    );
    let dir = tempfile::tempdir().unwrap();
    let runner = SnapshotRunner::new(Arc::new(source), Arc::new(FileSink::new(dir.path())), 1);

    let result = assert_ok!(runner.run_market_snapshot(&SnapshotOptions::default()).await);

    assert_eq!(result.log_path, dir.path().join("LatestSnapshotMarket.log"));
    let text = std::fs::read_to_string(&result.log_path).unwrap();
    let summary = parse_market_snapshot_log(&text);
    assert_eq!(summary.sports[0].sport_key, "basketball_nba");
    assert_eq!(summary.teams, vec!["Celtics", "Lakers"]);
    assert_eq!(summary.players, vec!["LeBron James"]);
    assert_eq!(summary.markets, vec!["h2h", "player_points"]);
}

#[tokio::test]
async fn http_client_drives_a_full_snapshot() {
    let server = MockServer::start().await;
    let start = odds_snapshot::odds_api::types::format_iso(OffsetDateTime::now_utc() + time::Duration::hours(3));

    Mock::given(method("GET"))
        .and(path("/sports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"key": "basketball_nba", "group": "Basketball", "title": "NBA", "active": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sports/basketball_nba/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "E1", "sport_key": "basketball_nba", "commence_time": start,
             "home_team": "Lakers", "away_team": "Celtics"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sports/basketball_nba/events/E1/markets"))
        .and(query_param("bookmakers", "draftkings,fanduel,novig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "E1",
            "bookmakers": [
                {"key": "fanduel", "title": "FanDuel", "markets": [{"key": "h2h"}, {"key": "totals"}]},
                {"key": "novig", "title": "Novig", "markets": [{"key": "h2h"}]}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sports/basketball_nba/events/E1/odds"))
        .and(query_param("markets", "h2h,totals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "E1", "bookmakers": []})))
        .mount(&server)
        .await;

    let config = Config {
        the_odds_api_key: Some("test-key".to_string()),
        odds_api_base_url: server.uri(),
        http_timeout_ms: Duration::from_secs(5).as_millis() as u64,
        ..Config::default()
    };
    let client = OddsApiClient::new(&config).unwrap();
    let sink = Arc::new(MemorySink::new());
    let runner = SnapshotRunner::new(Arc::new(client), sink.clone(), 2);

    let result = assert_ok!(runner.run_market_snapshot(&SnapshotOptions::default()).await);

    assert_eq!(result.events_captured, 1);
    assert_eq!(result.entries[0].teams, vec!["Lakers", "Celtics"]);
    assert_eq!(result.entries[0].market_keys, vec!["h2h", "totals"]);
    let log = sink.last(SnapshotKind::Market).unwrap();
    assert!(!log.contains("test-key"));
}

/// Live smoke test against the real provider.
#[tokio::test]
#[ignore = "requires THE_ODDS_API_KEY and spends quota"]
async fn live_odds_smoke() {
    dotenvy::dotenv().ok();
    let config = match Config::load() {
        Ok(c) if c.credential().is_ok() => c,
        _ => {
            println!("Skipping: THE_ODDS_API_KEY not set");
            return;
        }
    };

    let client = OddsApiClient::new(&config).unwrap();
    let runner = SnapshotRunner::new(Arc::new(client), Arc::new(MemorySink::new()), 1);

    let report = runner.run_odds_smoke(None, Some(1.0)).await.unwrap();
    println!("Primary sport: {} ({})", report.primary_sport.key, report.primary_sport.title);
    println!("Events checked: {}", report.events_checked);
}
