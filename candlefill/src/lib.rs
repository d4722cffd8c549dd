//! Candlefill keeps a local OHLCV candle store complete and current.
//!
//! Overview
//! - Pulls paginated candles from an upstream that implements
//!   `candlefill_core::CandleSource`.
//! - Measures per-instrument deficits against the bar-aligned present and
//!   requests only what is missing.
//! - Folds fetched rows into a single durable store keyed by
//!   `(instrument_id, ts)`, last write wins.
//! - Walks deep history once per instrument and remembers completed walks in
//!   a resume ledger, so restarts pick up where they stopped.
//!
//! Key behaviors and trade-offs
//! - Steady-state loop (`IngestionLoop`): one gap analysis per rotation, then
//!   instruments in list order. Transient failures skip the instrument until
//!   the next rotation; a missing instrument list stops the process.
//! - Backfill (`Backfill`): walks pages newest first. Rate-limited pages are
//!   re-requested after the cooldown by default (`RateLimitPolicy::RetrySamePage`);
//!   `SkipPage` moves on but leaves the instrument eligible for the next run.
//! - The store is rewritten whole on every merge. Only one writer process per
//!   store is supported.
//! - Both pipelines poll an external run signal between instruments; a request
//!   in flight always completes.
//!
//! Examples
//! Wiring the loop against in-memory collaborators:
//! ```rust,ignore
//! use std::sync::Arc;
//! use candlefill::Candlefill;
//!
//! let app = Candlefill::builder()
//!     .with_source(source)
//!     .with_repository(Arc::new(CsvCandleRepository::new("all_pairs_ohlc.csv")))
//!     .with_control(Arc::new(CsvControlFile::new("master_control.csv")))
//!     .instruments(["POOL1", "POOL2"])
//!     .build()?;
//!
//! let report = app.ingestion_loop().run_once().await?;
//! println!("{} rows added", report.rows_added());
//! ```
//!
//! Resuming a backfill:
//! ```rust,ignore
//! let app = Candlefill::builder()
//!     .with_source(source)
//!     .with_repository(repo)
//!     .with_ledger(Arc::new(CsvResumeLedger::open("fetched_pairs.csv")?))
//!     .build()?;
//! let report = app.backfill()?.run(&instruments).await?;
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
/// Steady-state loop and bulk backfill runners.
pub mod pipeline;
/// TOML settings for the binary.
pub mod settings;

pub use crate::core::{Candlefill, CandlefillBuilder, Clock};
pub use pipeline::backfill::Backfill;
pub use pipeline::ingest_loop::{IngestionLoop, LoopState};
pub use settings::{PathsConfig, Settings};

pub use candlefill_core::{
    BackfillConfig, BackfillEntry, BackfillOutcome, BackfillReport, Candle, CandleStore,
    CandlefillConfig, GapReport, IngestConfig, IngestError, InstrumentOutcome, InstrumentReport,
    Interval, MergeSummary, Page, RateLimitPolicy, RetryPolicy, RotationReport, SourceConfig,
    SourceError,
};
