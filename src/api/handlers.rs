//! HTTP API handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::error;

use crate::catalog::{bookmaker_regions, BookmakerInfo};
use crate::error::SnapshotError;
use crate::snapshot::options::{parse_csv, parse_flag, parse_number};
use crate::snapshot::{SnapshotOptions, SnapshotRunner};

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pipelines served by the API.
    pub runner: SnapshotRunner,
    /// Prometheus render handle, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
    /// Whether the server finished starting up.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    /// Create new app state.
    pub fn new(runner: SnapshotRunner, prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            runner,
            prometheus,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
}

/// Error body returned by every `/api` route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}

/// A failed request, rendered as a JSON error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a pipeline failure. Unexpected failures get `fallback` as message.
    fn from_snapshot(err: SnapshotError, fallback: &str) -> Self {
        match err {
            err if err.is_missing_credential() => Self::bad_request(err.to_string()),
            SnapshotError::CrawlNotAcknowledged => Self::bad_request(SnapshotError::CrawlNotAcknowledged.to_string()),
            SnapshotError::NoActiveSports => Self {
                status: StatusCode::NOT_FOUND,
                message: SnapshotError::NoActiveSports.to_string(),
            },
            err => {
                error!(error = %err, "{}", fallback);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: fallback.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse { ready: is_ready };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// `GET /api/bookmakers`: the static bookmaker table keyed by region.
pub async fn bookmakers() -> Json<std::collections::BTreeMap<&'static str, &'static [BookmakerInfo]>> {
    Json(bookmaker_regions())
}

/// `GET /api/market-snapshot`
pub async fn market_snapshot(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::MarketSnapshotResult> {
    state
        .runner
        .run_market_snapshot(&SnapshotOptions::from_params(&params))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Failed to capture market snapshot"))
}

/// `GET /api/sport-names-snapshot`
pub async fn sport_names_snapshot(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::SportNamesSnapshotResult> {
    state
        .runner
        .run_sport_names_snapshot(&SnapshotOptions::from_params(&params))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Failed to capture sport names snapshot"))
}

/// `GET /api/team-names-snapshot`
pub async fn team_names_snapshot(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::TeamNamesSnapshotResult> {
    state
        .runner
        .run_team_names_snapshot(&SnapshotOptions::from_params(&params))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Failed to capture team names snapshot"))
}

/// `GET /api/player-names-snapshot`
pub async fn player_names_snapshot(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::PlayerNamesSnapshotResult> {
    state
        .runner
        .run_player_names_snapshot(&SnapshotOptions::from_params(&params))
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Failed to capture player names snapshot"))
}

/// `GET /api/market-catalog?dangerous=true`
pub async fn market_catalog(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::MarketCatalogReport> {
    let acknowledged = parse_flag(params.get("dangerous").map(String::as_str)).unwrap_or(false);

    state
        .runner
        .run_market_catalog_crawl(&SnapshotOptions::from_params(&params), acknowledged)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Failed to build market catalog"))
}

/// `GET /api/markets-catalog?sportKey=..&eventId=..`
pub async fn event_markets_catalog(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::EventMarketCatalogReport> {
    let required = |name: &str| {
        params
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let (Some(sport_key), Some(event_id)) = (required("sportKey"), required("eventId")) else {
        return Err(ApiError::bad_request("sportKey and eventId query parameters are required"));
    };

    let bookmakers = params.get("bookmakers").map(|b| parse_csv(b)).unwrap_or_default();
    let use_cache = parse_flag(params.get("useCache").map(String::as_str)).unwrap_or(false);

    state
        .runner
        .write_event_market_catalog(
            &sport_key,
            &event_id,
            params.get("regions").map(String::as_str),
            bookmakers,
            use_cache,
        )
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Failed to write market catalog"))
}

/// `GET /api/odds-smoke`
pub async fn odds_smoke(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<crate::snapshot::OddsSmokeReport> {
    let hours_ahead = parse_number(params.get("hoursAhead").map(String::as_str));
    let max_markets = parse_number(params.get("maxMarkets").map(String::as_str));

    state
        .runner
        .run_odds_smoke(hours_ahead, max_markets)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_snapshot(e, "Odds smoke test failed"))
}
