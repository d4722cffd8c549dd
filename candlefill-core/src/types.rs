//! Re-export of foundational types from `candlefill-types`.
// Consolidated re-exports so downstream crates can depend on `candlefill-core` only

pub use candlefill_types::{Candle, CandleKey, CandleStore, GapEntry, GapReport, Interval};
pub use candlefill_types::{IngestError, SourceError};

pub use candlefill_types::{
    BackfillConfig, CandlefillConfig, IngestConfig, RateLimitPolicy, RetryDecision,
    RetryDiscipline, RetryPolicy, SourceConfig, duration_millis, duration_secs,
};
pub use candlefill_types::{
    BackfillEntry, BackfillOutcome, BackfillReport, InstrumentOutcome, InstrumentReport,
    MergeSummary, RotationReport,
};

pub use rust_decimal::Decimal;
