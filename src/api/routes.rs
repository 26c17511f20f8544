//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    bookmakers, event_markets_catalog, health, market_catalog, market_snapshot, metrics, odds_smoke,
    player_names_snapshot, ready, sport_names_snapshot, team_names_snapshot, AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        // Snapshot pipelines
        .route("/api/market-snapshot", get(market_snapshot))
        .route("/api/sport-names-snapshot", get(sport_names_snapshot))
        .route("/api/team-names-snapshot", get(team_names_snapshot))
        .route("/api/player-names-snapshot", get(player_names_snapshot))
        // Catalogs and diagnostics
        .route("/api/market-catalog", get(market_catalog))
        .route("/api/markets-catalog", get(event_markets_catalog))
        .route("/api/odds-smoke", get(odds_smoke))
        .route("/api/bookmakers", get(bookmakers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
