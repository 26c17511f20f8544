//! Snapshot pipelines, their result types and log artifacts.

pub mod format;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod sink;
pub mod types;

pub use options::{OptionDefaults, ResolvedOptions, SnapshotOptions};
pub use parser::{
    parse_market_snapshot_log, read_market_snapshot_log, ParsedSnapshotSummary, ParsedSport,
};
pub use pipeline::{no_events_warning, SnapshotRunner, NO_ACTIVE_SPORTS_NOTE};
pub use sink::{FileSink, MemorySink, SnapshotSink};
pub use types::{
    EventMarketCatalogReport, MarketCatalogReport, MarketSnapshotResult, OddsSmokeReport,
    PlayerNamesSnapshotResult, SnapshotKind, SportNamesSnapshotResult, TeamNamesSnapshotResult,
};
