//! Snapshot orchestrators.
//!
//! Every pipeline runs `sports -> events -> markets -> odds/names`, fanning
//! out per sport and per event. One semaphore bounds the upstream calls in
//! flight across both levels. Results are collected in input order, so
//! output and warnings stay deterministic whatever the limit. The first
//! upstream failure aborts the run and nothing is persisted.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{
    build_market_catalog, format_market_catalog_log, MarketCatalogBuilder, MarketSource,
    MARKET_CATALOG_LOG_FILENAME,
};
use crate::error::{OddsApiError, SnapshotError};
use crate::metrics;
use crate::names::{extract_player_outcome_names, filter_player_names, is_player_market, normalize_teams};
use crate::odds_api::source::OddsSource;
use crate::odds_api::types::{EventMarkets, EventSummary, FetchOptions, MarketQuery, Sport};

use super::format::{
    format_market_snapshot_log, format_player_names_log, format_sport_names_log,
    format_team_names_log,
};
use super::options::{count_or, positive_or, scope, OptionDefaults, ResolvedOptions, SnapshotOptions};
use super::sink::SnapshotSink;
use super::types::{
    sport_title, EventMarketCatalogReport, MarketCatalogReport, MarketSnapshotResult,
    OddsSmokeReport, PlayerNameSummary, PlayerNamesSnapshotResult, SmokeSample,
    SnapshotEventEntry, SnapshotKind, SportMarketSummary, SportNameEntry,
    SportNamesSnapshotResult, SportRef, TeamNameSummary, TeamNamesSnapshotResult, CRAWL_WARNING,
};

/// Note recorded by the sport-names pipeline when nothing is active.
pub const NO_ACTIVE_SPORTS_NOTE: &str = "No active sports available from Odds API.";

/// Smoke test default window in hours.
pub const SMOKE_HOURS_AHEAD: f64 = 24.0;
/// Smoke test default number of markets requested.
pub const SMOKE_MAX_MARKETS: usize = 3;

/// Warning for a sport with no events in the window.
pub fn no_events_warning(sport_key: &str, hours_ahead: f64) -> String {
    format!(
        "No events found for sport {} within the next {} hours.",
        sport_key, hours_ahead
    )
}

/// Warning for a sport whose player markets yielded no names.
pub fn no_player_names_warning(sport_key: &str) -> String {
    format!("No player-like outcome names found for sport {}.", sport_key)
}

/// Run `f` over `items` with at most `limit` in flight, keeping input order.
fn fan_out<'a, I, F, Fut, T>(items: I, limit: usize, f: F) -> BoxFuture<'a, Result<Vec<T>, SnapshotError>>
where
    I: IntoIterator + 'a,
    I::IntoIter: Send + 'a,
    F: FnMut(I::Item) -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, SnapshotError>> + Send + 'a,
    T: Send + 'a,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .try_collect()
        .boxed()
}

/// Outcome of scanning one sport.
enum SportScan<T> {
    /// No events in the window; carries the warning.
    NoEvents(String),
    /// Events were scanned.
    Scanned {
        sport_key: String,
        sport_title: Option<String>,
        items: Vec<T>,
    },
}

/// Per-event result of the player-names pipeline.
struct PlayerEventScan {
    names: Vec<String>,
    teams: Vec<String>,
    markets_checked: usize,
}

/// Drives the snapshot pipelines against an odds source and a sink.
#[derive(Clone)]
pub struct SnapshotRunner {
    source: Arc<dyn OddsSource>,
    sink: Arc<dyn SnapshotSink>,
    concurrency: usize,
    upstream_permits: Arc<Semaphore>,
}

impl fmt::Debug for SnapshotRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotRunner")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl SnapshotRunner {
    /// Create a runner. At most `concurrency` event-level upstream calls are
    /// in flight at once; 1 scans strictly one call at a time.
    pub fn new(source: Arc<dyn OddsSource>, sink: Arc<dyn SnapshotSink>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            source,
            sink,
            concurrency,
            upstream_permits: Arc::new(Semaphore::new(concurrency)),
        }
    }

    /// Await `call` while holding one of the shared upstream permits.
    async fn limited<T, Fut>(&self, call: Fut) -> Result<T, SnapshotError>
    where
        Fut: Future<Output = Result<T, OddsApiError>>,
    {
        // The semaphore is never closed, so a permit is always granted.
        let _permit = self.upstream_permits.acquire().await.ok();
        Ok(call.await?)
    }

    /// The underlying odds source.
    pub fn source(&self) -> &Arc<dyn OddsSource> {
        &self.source
    }

    /// Load a sport's events in the window, optionally sorted by start, then scoped.
    async fn load_events(
        &self,
        sport: &Sport,
        hours_ahead: f64,
        limit: usize,
        sort_by_start: bool,
        fetch: FetchOptions,
    ) -> Result<Vec<EventSummary>, SnapshotError> {
        let mut events = self
            .limited(self.source.fetch_events_for_sport(&sport.key, hours_ahead, fetch))
            .await?;
        let available = events.len();

        if sort_by_start {
            events.sort_by_key(|event| event.start_time);
        }
        let events = scope(events, limit);

        debug!(sport = %sport.key, available, scanned = events.len(), "Loaded events");
        Ok(events)
    }

    /// Fetch sports and apply the active filter, sports filter and scope.
    async fn load_sports(&self, options: &ResolvedOptions, fetch: FetchOptions) -> Result<Vec<Sport>, SnapshotError> {
        let sports = self.source.fetch_sports(fetch).await?;
        let total = sports.len();
        let selected = options.select_sports(sports);

        debug!(total, selected = selected.len(), "Loaded sports");
        Ok(selected)
    }

    /// Record metrics for a finished run.
    fn finish(&self, kind: SnapshotKind, warnings: &[String]) {
        metrics::record_snapshot_run(kind.label(), warnings.len());
        for warning in warnings {
            warn!(kind = %kind, "{}", warning);
        }
    }

    // === Market snapshot ===

    /// Capture markets and odds for the scoped events of every scoped sport.
    #[instrument(skip(self, options))]
    pub async fn run_market_snapshot(&self, options: &SnapshotOptions) -> Result<MarketSnapshotResult, SnapshotError> {
        let kind = SnapshotKind::Market;
        let _timer = metrics::timer_snapshot(kind.label());
        self.source.check_credential()?;
        let resolved = options.resolve();
        let opts = &resolved;

        let sports = self.load_sports(opts, opts.fetch_options()).await?;
        if sports.is_empty() {
            return Err(SnapshotError::NoActiveSports);
        }
        info!(sports = sports.len(), "Starting market snapshot");

        let scans = fan_out(sports.iter(), self.concurrency, move |sport| {
            self.scan_market_sport(sport, opts)
        })
        .await?;

        let mut warnings = Vec::new();
        let mut entries = Vec::new();
        let mut markets_by_sport = Vec::new();

        for scan in scans {
            match scan {
                SportScan::NoEvents(warning) => warnings.push(warning),
                SportScan::Scanned {
                    sport_key,
                    sport_title,
                    items,
                } => {
                    let market_keys: BTreeSet<String> = items
                        .iter()
                        .flat_map(|entry| entry.market_keys.iter().cloned())
                        .collect();
                    markets_by_sport.push(SportMarketSummary {
                        sport_key,
                        sport_title,
                        market_keys: market_keys.into_iter().collect(),
                    });
                    entries.extend(items);
                }
            }
        }

        let mut snapshot = MarketSnapshotResult {
            captured_at: self.source.now(),
            log_path: PathBuf::new(),
            options: resolved.clone(),
            sports_checked: sports.len(),
            events_captured: entries.len(),
            entries,
            markets_by_sport,
            warnings,
        };

        let body = format_market_snapshot_log(&snapshot)?;
        snapshot.log_path = self.sink.persist(kind, &body).await?;
        self.finish(kind, &snapshot.warnings);

        info!(
            events = snapshot.events_captured,
            path = %snapshot.log_path.display(),
            "Market snapshot captured"
        );
        Ok(snapshot)
    }

    async fn scan_market_sport(
        &self,
        sport: &Sport,
        options: &ResolvedOptions,
    ) -> Result<SportScan<SnapshotEventEntry>, SnapshotError> {
        let fetch = options.fetch_options();
        let events = self
            .load_events(sport, options.hours_ahead, options.max_events_per_sport, true, fetch)
            .await?;

        if events.is_empty() {
            return Ok(SportScan::NoEvents(no_events_warning(&sport.key, options.hours_ahead)));
        }

        let query = options.market_query();
        let query = &query;
        let items = fan_out(events.iter(), self.concurrency, move |event| {
            self.capture_event(sport, event, query, fetch)
        })
        .await?;

        Ok(SportScan::Scanned {
            sport_key: sport.key.clone(),
            sport_title: sport_title(sport),
            items,
        })
    }

    async fn capture_event(
        &self,
        sport: &Sport,
        event: &EventSummary,
        query: &MarketQuery,
        fetch: FetchOptions,
    ) -> Result<SnapshotEventEntry, SnapshotError> {
        let markets = self
            .limited(self.source.fetch_markets_for_event(&sport.key, &event.event_id, query, fetch))
            .await?;
        let odds = self
            .limited(self.source.fetch_odds_for_event(
                &sport.key,
                &event.event_id,
                &markets.market_keys,
                query,
                fetch,
            ))
            .await?;

        Ok(SnapshotEventEntry {
            sport_key: sport.key.clone(),
            sport_title: sport_title(sport),
            event_id: event.event_id.clone(),
            teams: normalize_teams(event),
            start_time: event.start_time,
            market_keys: markets.market_keys,
            odds_fetched_at: odds.fetched_at,
            odds: odds.raw,
        })
    }

    // === Sport names ===

    /// List the scoped active sports. An empty directory is a note, not an error.
    #[instrument(skip(self, options))]
    pub async fn run_sport_names_snapshot(
        &self,
        options: &SnapshotOptions,
    ) -> Result<SportNamesSnapshotResult, SnapshotError> {
        let kind = SnapshotKind::SportNames;
        let _timer = metrics::timer_snapshot(kind.label());
        self.source.check_credential()?;
        let resolved = options.resolve();

        let sports = self.load_sports(&resolved, resolved.fetch_options()).await?;
        let mut warnings = Vec::new();
        if sports.is_empty() {
            warnings.push(NO_ACTIVE_SPORTS_NOTE.to_string());
        }

        let mut snapshot = SportNamesSnapshotResult {
            captured_at: self.source.now(),
            log_path: PathBuf::new(),
            sports_checked: sports.len(),
            sport_names: sports.iter().map(SportNameEntry::from).collect(),
            options: resolved,
            warnings,
        };

        let body = format_sport_names_log(&snapshot);
        snapshot.log_path = self.sink.persist(kind, &body).await?;
        self.finish(kind, &snapshot.warnings);

        info!(sports = snapshot.sports_checked, "Sport names snapshot captured");
        Ok(snapshot)
    }

    // === Team names ===

    /// Collect normalized team names per scoped sport.
    #[instrument(skip(self, options))]
    pub async fn run_team_names_snapshot(
        &self,
        options: &SnapshotOptions,
    ) -> Result<TeamNamesSnapshotResult, SnapshotError> {
        let kind = SnapshotKind::TeamNames;
        let _timer = metrics::timer_snapshot(kind.label());
        self.source.check_credential()?;
        let resolved = options.resolve();
        let opts = &resolved;

        let sports = self.load_sports(opts, opts.fetch_options()).await?;
        if sports.is_empty() {
            return Err(SnapshotError::NoActiveSports);
        }

        let scans = fan_out(sports.iter(), self.concurrency, move |sport| async move {
            let events = self
                .load_events(sport, opts.hours_ahead, opts.max_events_per_sport, false, opts.fetch_options())
                .await?;

            if events.is_empty() {
                return Ok(SportScan::NoEvents(no_events_warning(&sport.key, opts.hours_ahead)));
            }

            Ok::<_, SnapshotError>(SportScan::Scanned {
                sport_key: sport.key.clone(),
                sport_title: sport_title(sport),
                items: events.iter().map(normalize_teams).collect::<Vec<_>>(),
            })
        })
        .await?;

        let mut warnings = Vec::new();
        let mut teams_by_sport = Vec::new();
        let mut events_captured = 0;

        for scan in scans {
            match scan {
                SportScan::NoEvents(warning) => warnings.push(warning),
                SportScan::Scanned {
                    sport_key,
                    sport_title,
                    items,
                } => {
                    let teams: BTreeSet<String> = items.iter().flatten().cloned().collect();
                    events_captured += items.len();
                    teams_by_sport.push(TeamNameSummary {
                        sport_key,
                        sport_title,
                        teams: teams.into_iter().collect(),
                        events_checked: items.len(),
                    });
                }
            }
        }

        let mut snapshot = TeamNamesSnapshotResult {
            captured_at: self.source.now(),
            log_path: PathBuf::new(),
            options: resolved.clone(),
            sports_checked: sports.len(),
            events_captured,
            teams_by_sport,
            warnings,
        };

        let body = format_team_names_log(&snapshot);
        snapshot.log_path = self.sink.persist(kind, &body).await?;
        self.finish(kind, &snapshot.warnings);

        info!(events = events_captured, "Team names snapshot captured");
        Ok(snapshot)
    }

    // === Player names ===

    /// Collect player-like outcome names from `player_` markets per scoped sport.
    #[instrument(skip(self, options))]
    pub async fn run_player_names_snapshot(
        &self,
        options: &SnapshotOptions,
    ) -> Result<PlayerNamesSnapshotResult, SnapshotError> {
        let kind = SnapshotKind::PlayerNames;
        let _timer = metrics::timer_snapshot(kind.label());
        self.source.check_credential()?;
        let resolved = options.resolve();
        let opts = &resolved;

        let sports = self.load_sports(opts, opts.fetch_options()).await?;
        if sports.is_empty() {
            return Err(SnapshotError::NoActiveSports);
        }

        let scans = fan_out(sports.iter(), self.concurrency, move |sport| {
            self.scan_player_sport(sport, opts)
        })
        .await?;

        let mut warnings = Vec::new();
        let mut player_names_by_sport = Vec::new();
        let mut events_captured = 0;
        let mut markets_captured = 0;

        for scan in scans {
            match scan {
                SportScan::NoEvents(warning) => warnings.push(warning),
                SportScan::Scanned {
                    sport_key,
                    sport_title,
                    items,
                } => {
                    let known_teams: Vec<String> = items.iter().flat_map(|e| e.teams.iter().cloned()).collect();
                    let player_names = filter_player_names(items.iter().flat_map(|e| e.names.iter()), &known_teams);
                    let markets_checked: usize = items.iter().map(|e| e.markets_checked).sum();

                    if player_names.is_empty() {
                        warnings.push(no_player_names_warning(&sport_key));
                    }

                    events_captured += items.len();
                    markets_captured += markets_checked;
                    player_names_by_sport.push(PlayerNameSummary {
                        sport_key,
                        sport_title,
                        player_names,
                        events_checked: items.len(),
                        markets_checked,
                    });
                }
            }
        }

        let mut snapshot = PlayerNamesSnapshotResult {
            captured_at: self.source.now(),
            log_path: PathBuf::new(),
            options: resolved.clone(),
            sports_checked: sports.len(),
            events_captured,
            markets_captured,
            player_names_by_sport,
            warnings,
        };

        let body = format_player_names_log(&snapshot);
        snapshot.log_path = self.sink.persist(kind, &body).await?;
        self.finish(kind, &snapshot.warnings);

        info!(
            events = events_captured,
            markets = markets_captured,
            "Player names snapshot captured"
        );
        Ok(snapshot)
    }

    async fn scan_player_sport(
        &self,
        sport: &Sport,
        options: &ResolvedOptions,
    ) -> Result<SportScan<PlayerEventScan>, SnapshotError> {
        let fetch = options.fetch_options();
        let events = self
            .load_events(sport, options.hours_ahead, options.max_events_per_sport, false, fetch)
            .await?;

        if events.is_empty() {
            return Ok(SportScan::NoEvents(no_events_warning(&sport.key, options.hours_ahead)));
        }

        let query = options.market_query();
        let query = &query;
        let items = fan_out(events.iter(), self.concurrency, move |event| async move {
            let markets = self
                .limited(self.source.fetch_markets_for_event(&sport.key, &event.event_id, query, fetch))
                .await?;

            Ok::<_, SnapshotError>(PlayerEventScan {
                names: extract_player_outcome_names(&markets.raw_markets),
                teams: normalize_teams(event),
                markets_checked: markets
                    .raw_markets
                    .iter()
                    .filter(|market| is_player_market(&market.key))
                    .count(),
            })
        })
        .await?;

        Ok(SportScan::Scanned {
            sport_key: sport.key.clone(),
            sport_title: sport_title(sport),
            items,
        })
    }

    // === Market catalog ===

    /// Crawl scoped sports and events and aggregate every market seen.
    ///
    /// Quota-expensive; refused unless `acknowledged`. Nothing is persisted.
    #[instrument(skip(self, options))]
    pub async fn run_market_catalog_crawl(
        &self,
        options: &SnapshotOptions,
        acknowledged: bool,
    ) -> Result<MarketCatalogReport, SnapshotError> {
        if !acknowledged {
            return Err(SnapshotError::CrawlNotAcknowledged);
        }
        let kind = SnapshotKind::MarketCatalog;
        let _timer = metrics::timer_snapshot(kind.label());
        self.source.check_credential()?;

        let resolved = options.resolve_with(&OptionDefaults::crawl());
        let opts = &resolved;
        warn!(
            max_sports = opts.max_sports,
            max_events_per_sport = opts.max_events_per_sport,
            regions = %opts.regions,
            bookmakers = %opts.bookmakers.join(","),
            "Full market catalog crawl requested; this is quota-expensive"
        );

        let sports = self.load_sports(opts, FetchOptions::cached(true)).await?;
        if sports.is_empty() {
            return Err(SnapshotError::NoActiveSports);
        }

        let query = opts.market_query();
        let query = &query;
        let scanned = fan_out(sports.iter(), self.concurrency, move |sport| async move {
            let events = self
                .load_events(sport, opts.hours_ahead, opts.max_events_per_sport, true, FetchOptions::cached(true))
                .await?;
            info!(sport = %sport.key, events = events.len(), "Scanning events for market catalog");

            let markets: Vec<EventMarkets> = fan_out(events.iter(), self.concurrency, move |event| async move {
                self.limited(self.source.fetch_markets_for_event(
                    &sport.key,
                    &event.event_id,
                    query,
                    FetchOptions::cached(false),
                ))
                .await
            })
            .await?;

            Ok::<_, SnapshotError>((sport.key.clone(), markets))
        })
        .await?;

        let mut builder = MarketCatalogBuilder::new(opts.bookmakers.clone());
        let mut events_scanned = 0;
        for (sport_key, markets) in &scanned {
            for event_markets in markets {
                builder.record_event(sport_key, event_markets);
                events_scanned += 1;
            }
        }

        let report = MarketCatalogReport {
            generated_at: self.source.now(),
            bookmakers: opts.bookmakers.clone(),
            sports_scanned: sports.len(),
            events_scanned,
            markets: builder.finalize(),
            warning: CRAWL_WARNING,
        };
        metrics::record_snapshot_run(kind.label(), 0);

        info!(
            sports = report.sports_scanned,
            events = report.events_scanned,
            markets = report.markets.len(),
            "Completed market catalog crawl"
        );
        Ok(report)
    }

    /// Fetch one event's markets and write `LatestMarketsCatalog.log`.
    #[instrument(skip(self, bookmakers))]
    pub async fn write_event_market_catalog(
        &self,
        sport_key: &str,
        event_id: &str,
        regions: Option<&str>,
        bookmakers: Vec<String>,
        use_cache: bool,
    ) -> Result<EventMarketCatalogReport, SnapshotError> {
        self.source.check_credential()?;
        let regions = regions
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("us")
            .to_string();
        let bookmakers: Vec<String> = bookmakers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        let query = MarketQuery {
            regions: regions.clone(),
            bookmakers: bookmakers.clone(),
        };

        let markets = self
            .source
            .fetch_markets_for_event(sport_key, event_id, &query, FetchOptions::cached(use_cache))
            .await?;

        let catalog = build_market_catalog(&markets.raw_markets);
        let bookmaker_note = if bookmakers.is_empty() {
            String::new()
        } else {
            format!(", bookmakers={}", bookmakers.join(","))
        };
        let source_description = format!(
            "Markets for sport {} event {} (regions={}{})",
            sport_key, event_id, regions, bookmaker_note
        );
        let generated_at = self.source.now();
        let body = format_market_catalog_log(&catalog, generated_at, Some(&source_description));
        let log_path = self.sink.persist(SnapshotKind::MarketCatalog, &body).await?;

        let core_markets = catalog
            .iter()
            .filter(|m| m.source == MarketSource::Core)
            .count();

        Ok(EventMarketCatalogReport {
            generated_at,
            sport_key: sport_key.to_string(),
            event_id: event_id.to_string(),
            regions,
            bookmakers,
            total_markets: catalog.len(),
            core_markets,
            additional_markets: catalog.len() - core_markets,
            log_file: MARKET_CATALOG_LOG_FILENAME,
            log_path,
        })
    }

    // === Smoke test ===

    /// First active sport, first event in the window, odds for its first markets.
    #[instrument(skip(self))]
    pub async fn run_odds_smoke(
        &self,
        hours_ahead: Option<f64>,
        max_markets: Option<f64>,
    ) -> Result<OddsSmokeReport, SnapshotError> {
        self.source.check_credential()?;
        let hours_ahead = positive_or(hours_ahead, SMOKE_HOURS_AHEAD);
        let max_markets = count_or(max_markets, SMOKE_MAX_MARKETS);
        let fetch = FetchOptions::cached(false);

        let sports = self.source.fetch_sports(fetch).await?;
        let primary = sports
            .into_iter()
            .find(|sport| sport.active)
            .ok_or(SnapshotError::NoActiveSports)?;
        info!(
            sport = %primary.key,
            hours_ahead,
            max_markets,
            "Odds smoke test using primary sport"
        );
        let primary_sport = SportRef {
            key: primary.key.clone(),
            title: primary.title.clone(),
        };

        let events = self
            .source
            .fetch_events_for_sport(&primary.key, hours_ahead, fetch)
            .await?;
        let Some(sample) = events.first() else {
            return Ok(OddsSmokeReport {
                tested_at: self.source.now(),
                primary_sport,
                events_checked: 0,
                sample_event: None,
                note: Some(format!(
                    "No events found for {} in the next {} hours.",
                    primary.key, hours_ahead
                )),
            });
        };

        let teams = normalize_teams(sample);
        info!(event_id = %sample.event_id, teams = %teams.join(" vs "), "Odds smoke test inspecting event");

        let query = MarketQuery::default();
        let markets = self
            .source
            .fetch_markets_for_event(&primary.key, &sample.event_id, &query, fetch)
            .await?;
        let requested = scope(markets.market_keys.clone(), max_markets);
        let odds = self
            .source
            .fetch_odds_for_event(&primary.key, &sample.event_id, &requested, &query, fetch)
            .await?;

        Ok(OddsSmokeReport {
            tested_at: self.source.now(),
            primary_sport,
            events_checked: events.len(),
            sample_event: Some(SmokeSample {
                event_id: sample.event_id.clone(),
                teams,
                start_time: sample.start_time,
                markets_requested: requested,
                total_markets_available: markets.market_keys.len(),
                odds,
            }),
            note: None,
        })
    }
}
