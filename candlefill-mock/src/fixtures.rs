use chrono::{DateTime, Duration, Utc};
use candlefill_core::{Candle, Decimal, Interval};

/// Deterministic bar for `instrument_id` at `ts`.
///
/// Prices derive from the timestamp so two calls for the same key always
/// produce identical rows.
#[must_use]
pub fn candle(instrument_id: &str, ts: DateTime<Utc>) -> Candle {
    let base = Decimal::new(ts.timestamp().rem_euclid(10_000) + 1_000, 2);
    Candle {
        instrument_id: instrument_id.to_string(),
        ts,
        open: base,
        high: base + Decimal::ONE,
        low: base - Decimal::ONE,
        close: base + Decimal::new(5, 1),
        volume: Decimal::from(ts.timestamp().rem_euclid(97) + 1),
    }
}

/// `count` consecutive bars ending at `last` (inclusive), oldest first.
#[must_use]
pub fn series_ending_at(
    instrument_id: &str,
    last: DateTime<Utc>,
    count: usize,
    interval: Interval,
) -> Vec<Candle> {
    let step = Duration::seconds(interval.step_seconds());
    (0..count)
        .rev()
        .filter_map(|back| {
            let back = i32::try_from(back).ok()?;
            Some(candle(instrument_id, last - step * back))
        })
        .collect()
}
