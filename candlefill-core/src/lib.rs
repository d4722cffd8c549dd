//! candlefill-core
//!
//! Core traits and algorithms of the candlefill ingestion pipeline.
//!
//! - `types`: re-exported data structures (candles, stores, reports, config).
//! - `connector`: the `CandleSource` trait implemented by upstream adapters.
//! - `storage`: repository, ledger, control and status seams.
//! - `fetcher`: `PageFetcher`, one page at a time under a retry policy.
//! - `store`: `MergeStore`, the read-modify-write cycle over a repository.
//! - `timeseries`: grouping, gap analysis and merging over candle slices.
//!
//! Async runtime (Tokio)
//! ---------------------
//! `PageFetcher` waits with `tokio::time::sleep` for pacing and cooldowns, so
//! fetching must run under a Tokio 1.x runtime. Tests drive those waits with
//! a paused clock.
#![warn(missing_docs)]

/// Upstream candle source trait and page requests.
pub mod connector;
/// Page fetching with retry and pacing.
pub mod fetcher;
/// Durable state and collaborator traits.
pub mod storage;
/// Merge cycle over a candle repository.
pub mod store;
/// Time-series utilities for grouping, gap analysis and merging.
pub mod timeseries;
pub mod types;

pub use connector::{CandleSource, Page, PageRequest};
pub use fetcher::{PageFetcher, PageOutcome, jitter_wait};
pub use storage::{
    AlwaysOn, CandleRepository, ControlSource, InstrumentSource, NoStatus, ResumeLedger,
    StaticInstruments, StatusSink, dedup_instruments,
};
pub use store::MergeStore;
pub use timeseries::gaps::analyze_gaps;
pub use timeseries::group::{InstrumentSeries, group_by_instrument};
pub use timeseries::merge::merge_store;
pub use types::*;
