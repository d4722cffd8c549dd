//! Time-series utilities used by the ingestion pipelines.
//!
//! Modules include:
//! - `group`: split a sorted candle sequence into per-instrument runs
//! - `gaps`: measure how far each stored series lags behind "now"
//! - `merge`: fold freshly fetched rows into a store snapshot
/// Per-instrument deficit analysis.
pub mod gaps;
/// Grouping of sorted candles by instrument.
pub mod group;
/// Deduplicating merge of new rows into a store.
pub mod merge;
