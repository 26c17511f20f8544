//! Odds API snapshot tool entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use odds_snapshot::api::{create_router, AppState};
use odds_snapshot::catalog::bookmaker_regions;
use odds_snapshot::config::Config;
use odds_snapshot::metrics;
use odds_snapshot::odds_api::OddsApiClient;
use odds_snapshot::snapshot::options::parse_csv;
use odds_snapshot::snapshot::{
    read_market_snapshot_log, FileSink, SnapshotKind, SnapshotOptions, SnapshotRunner,
};
use odds_snapshot::utils::shutdown_signal;

/// Odds API snapshot and catalog tool.
#[derive(Parser, Debug)]
#[command(name = "odds-snapshot")]
#[command(about = "Capture sports, events, markets and odds from The Odds API into flat logs")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Options shared by the snapshot commands.
#[derive(ClapArgs, Debug, Default)]
struct SnapshotArgs {
    /// Forward window in hours.
    #[arg(long)]
    hours_ahead: Option<f64>,

    /// Number of active sports to scan.
    #[arg(long)]
    max_sports: Option<f64>,

    /// Number of events to scan per sport.
    #[arg(long)]
    max_events_per_sport: Option<f64>,

    /// Comma-separated regions.
    #[arg(long)]
    regions: Option<String>,

    /// Comma-separated bookmaker keys.
    #[arg(long)]
    bookmakers: Option<String>,

    /// Serve repeated requests from the response cache.
    #[arg(long)]
    use_cache: bool,

    /// Comma-separated sport keys, or `all`.
    #[arg(long)]
    sports: Option<String>,
}

impl SnapshotArgs {
    fn to_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            hours_ahead: self.hours_ahead,
            max_sports: self.max_sports,
            max_events_per_sport: self.max_events_per_sport,
            regions: self.regions.clone(),
            bookmakers: self.bookmakers.as_deref().map(parse_csv),
            use_cache: self.use_cache.then_some(true),
            sports: self.sports.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture markets and odds per event (default).
    MarketSnapshot(SnapshotArgs),

    /// List active sports.
    SportNames(SnapshotArgs),

    /// Collect team names per sport.
    TeamNames(SnapshotArgs),

    /// Collect player-like outcome names per sport.
    PlayerNames(SnapshotArgs),

    /// Crawl sports and events and aggregate every market (quota-expensive).
    MarketCatalog {
        /// Acknowledge the quota cost of the crawl.
        #[arg(long)]
        dangerous: bool,

        #[command(flatten)]
        snapshot: SnapshotArgs,
    },

    /// Write the market reference catalog for one event.
    EventMarkets {
        /// Sport key.
        #[arg(long)]
        sport: String,

        /// Event ID.
        #[arg(long)]
        event: String,

        /// Comma-separated regions.
        #[arg(long)]
        regions: Option<String>,

        /// Comma-separated bookmaker keys.
        #[arg(long)]
        bookmakers: Option<String>,

        /// Serve the markets request from the response cache.
        #[arg(long)]
        use_cache: bool,
    },

    /// Fetch odds for one sample event end to end.
    Smoke {
        /// Forward window in hours.
        #[arg(long)]
        hours_ahead: Option<f64>,

        /// Number of markets to request odds for.
        #[arg(long)]
        max_markets: Option<f64>,
    },

    /// List known bookmakers by region.
    Bookmakers,

    /// Summarize a market snapshot log.
    ParseLog {
        /// Log file to read.
        #[arg(default_value = "LatestSnapshotMarket.log")]
        path: PathBuf,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Serve the snapshot pipelines over HTTP.
    Serve {
        /// HTTP server port (defaults to PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging; config errors surface later in the command itself
    let directive = Config::load().unwrap_or_default().log_directive(args.verbose);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = args
        .json_logs
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!args.json_logs).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::MarketSnapshot(snapshot)) => {
            let runner = build_runner()?;
            print_json(&runner.run_market_snapshot(&snapshot.to_options()).await?)
        }
        Some(Command::SportNames(snapshot)) => {
            let runner = build_runner()?;
            print_json(&runner.run_sport_names_snapshot(&snapshot.to_options()).await?)
        }
        Some(Command::TeamNames(snapshot)) => {
            let runner = build_runner()?;
            print_json(&runner.run_team_names_snapshot(&snapshot.to_options()).await?)
        }
        Some(Command::PlayerNames(snapshot)) => {
            let runner = build_runner()?;
            print_json(&runner.run_player_names_snapshot(&snapshot.to_options()).await?)
        }
        Some(Command::MarketCatalog { dangerous, snapshot }) => {
            let runner = build_runner()?;
            print_json(
                &runner
                    .run_market_catalog_crawl(&snapshot.to_options(), dangerous)
                    .await?,
            )
        }
        Some(Command::EventMarkets {
            sport,
            event,
            regions,
            bookmakers,
            use_cache,
        }) => {
            let runner = build_runner()?;
            let bookmakers = bookmakers.as_deref().map(parse_csv).unwrap_or_default();
            print_json(
                &runner
                    .write_event_market_catalog(&sport, &event, regions.as_deref(), bookmakers, use_cache)
                    .await?,
            )
        }
        Some(Command::Smoke {
            hours_ahead,
            max_markets,
        }) => {
            let runner = build_runner()?;
            print_json(&runner.run_odds_smoke(hours_ahead, max_markets).await?)
        }
        Some(Command::Bookmakers) => print_json(&bookmaker_regions()),
        Some(Command::ParseLog { path }) => cmd_parse_log(path).await,
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Serve { port }) => cmd_serve(port).await,
        None => {
            let runner = build_runner()?;
            print_json(
                &runner
                    .run_market_snapshot(&SnapshotArgs::default().to_options())
                    .await?,
            )
        }
    }
}

/// Build a runner backed by the live client and the configured log directory.
fn build_runner() -> anyhow::Result<SnapshotRunner> {
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        anyhow::bail!("Configuration validation failed: {}", e);
    }

    let client = OddsApiClient::new(&config)?;
    let sink = FileSink::new(&config.snapshot_dir);

    Ok(SnapshotRunner::new(
        Arc::new(client),
        Arc::new(sink),
        config.snapshot_concurrency,
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Summarize a market snapshot log.
async fn cmd_parse_log(path: PathBuf) -> anyhow::Result<()> {
    let summary = read_market_snapshot_log(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;

    info!(
        path = %path.display(),
        sports = summary.sports.len(),
        teams = summary.teams.len(),
        players = summary.players.len(),
        markets = summary.markets.len(),
        "Parsed snapshot log"
    );
    print_json(&summary)
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("ODDS SNAPSHOT - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Check credential presence, never its value
    print!("Checking Odds API key... ");
    match config.credential() {
        Ok(_) => println!("OK"),
        Err(e) => {
            println!("MISSING");
            println!("  {}", e);
        }
    }

    println!();
    println!("Configuration Summary:");
    println!("  Base URL:          {}", config.odds_api_base_url);
    println!("  Cache TTL:         {}ms", config.cache_ttl_ms);
    println!("  HTTP timeout:      {}ms", config.http_timeout_ms);
    println!("  Snapshot dir:      {}", config.snapshot_dir.display());
    println!("  Concurrency:       {}", config.snapshot_concurrency);
    println!("  Port:              {}", config.port);
    println!();
    println!(
        "Log files: {}",
        [
            SnapshotKind::Market,
            SnapshotKind::SportNames,
            SnapshotKind::TeamNames,
            SnapshotKind::PlayerNames,
            SnapshotKind::MarketCatalog,
        ]
        .map(SnapshotKind::file_name)
        .join(", ")
    );
    println!("======================================================================");

    Ok(())
}

/// Serve the pipelines over HTTP until a shutdown signal arrives.
async fn cmd_serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load()?;
    if let Err(e) = config.validate() {
        anyhow::bail!("Configuration validation failed: {}", e);
    }
    if config.credential().is_err() {
        warn!("THE_ODDS_API_KEY is not set; snapshot routes will answer 400");
    }

    let prometheus = metrics::install_prometheus()?;
    let client = OddsApiClient::new(&config)?;
    let runner = SnapshotRunner::new(
        Arc::new(client),
        Arc::new(FileSink::new(&config.snapshot_dir)),
        config.snapshot_concurrency,
    );
    let app_state = AppState::new(runner, Some(prometheus));

    let port = port.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    app_state.set_ready(true);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
