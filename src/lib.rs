//! Caching client and snapshot pipelines for The Odds API.
//!
//! The crate walks the provider's hierarchy (sports, then events in a
//! forward window, then the markets offered per event, then odds) and
//! reduces it into flat, human-readable log artifacts: a market snapshot,
//! sport/team/player name directories and a market reference catalog.
//!
//! # Flow
//!
//! ```text
//! OddsApiClient (TTL cache, in-flight dedup)
//!     │
//!     ▼
//! SnapshotRunner ── sports ─► events ─► markets ─► odds / names
//!     │
//!     ▼
//! SnapshotSink ── LatestSnapshot*.log, LatestMarketsCatalog.log
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`odds_api`]: Cached Odds API client, source trait and mock
//! - [`names`]: Team and player name heuristics
//! - [`catalog`]: Market catalog aggregation and reference data
//! - [`snapshot`]: Option resolution, pipelines, log formatting and parsing
//! - [`metrics`]: Prometheus metrics
//! - [`api`]: HTTP API for the pipelines, health and metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod names;
pub mod odds_api;
pub mod snapshot;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
