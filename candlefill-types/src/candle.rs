//! Candle rows and the in-memory candle store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV bar for a single instrument.
///
/// The persisted column for `ts` is named `time`; the legacy `pair_id` header is
/// accepted for `instrument_id` when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Upstream identifier of the instrument (pool address, pair id, ...).
    #[serde(alias = "pair_id")]
    pub instrument_id: String,
    /// Bar open instant in UTC.
    #[serde(rename = "time")]
    pub ts: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest traded price.
    pub high: Decimal,
    /// Lowest traded price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume over the bar.
    pub volume: Decimal,
}

/// Identity of a candle inside a store: `(instrument_id, ts)`.
pub type CandleKey = (String, DateTime<Utc>);

impl Candle {
    /// Returns the owned store key of this candle.
    #[must_use]
    pub fn key(&self) -> CandleKey {
        (self.instrument_id.clone(), self.ts)
    }
}

/// The full collection of candles across all instruments.
///
/// Invariant: no two candles share `(instrument_id, ts)` and candles are sorted
/// by `(instrument_id, ts)` ascending. Every constructor enforces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandleStore {
    candles: Vec<Candle>,
}

impl CandleStore {
    /// An empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            candles: Vec::new(),
        }
    }

    /// Build a store from arbitrary rows.
    ///
    /// Rows are sorted by `(instrument_id, ts)`; when several rows share a key the
    /// one appearing last in `candles` is kept.
    #[must_use]
    pub fn from_candles(mut candles: Vec<Candle>) -> Self {
        // Stable sort keeps input order within equal keys, so the last of each run wins.
        candles.sort_by(|a, b| {
            a.instrument_id
                .cmp(&b.instrument_id)
                .then_with(|| a.ts.cmp(&b.ts))
        });
        let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
        for c in candles {
            match out.last_mut() {
                Some(prev) if prev.instrument_id == c.instrument_id && prev.ts == c.ts => {
                    *prev = c;
                }
                _ => out.push(c),
            }
        }
        Self { candles: out }
    }

    /// Number of candles in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// True when the store holds no candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Sorted, de-duplicated view of all candles.
    #[must_use]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Consume the store and return its sorted rows.
    #[must_use]
    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }

    /// Sorted slice of the candles belonging to `instrument_id`.
    #[must_use]
    pub fn series(&self, instrument_id: &str) -> &[Candle] {
        let start = self
            .candles
            .partition_point(|c| c.instrument_id.as_str() < instrument_id);
        let end = start
            + self.candles[start..].partition_point(|c| c.instrument_id.as_str() == instrument_id);
        &self.candles[start..end]
    }

    /// Latest stored instant for `instrument_id`, if any candle exists.
    #[must_use]
    pub fn last_timestamp(&self, instrument_id: &str) -> Option<DateTime<Utc>> {
        self.series(instrument_id).last().map(|c| c.ts)
    }
}
