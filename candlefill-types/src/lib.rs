//! Candlefill-specific data transfer objects and configuration primitives.
#![warn(missing_docs)]

mod candle;
mod config;
mod error;
mod gap;
mod interval;
mod reports;

pub use candle::{Candle, CandleKey, CandleStore};
pub use config::{
    BackfillConfig, CandlefillConfig, IngestConfig, RateLimitPolicy, RetryDecision,
    RetryDiscipline, RetryPolicy, SourceConfig, duration_millis, duration_secs,
};
pub use error::{IngestError, SourceError};
pub use gap::{GapEntry, GapReport};
pub use interval::Interval;
pub use reports::{
    BackfillEntry, BackfillOutcome, BackfillReport, InstrumentOutcome, InstrumentReport,
    MergeSummary, RotationReport,
};
