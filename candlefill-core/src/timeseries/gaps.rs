use chrono::{DateTime, Utc};

use crate::timeseries::group::group_by_instrument;
use crate::{CandleStore, GapEntry, GapReport, Interval};

/// Measure, per stored instrument, how many bars are missing up to `now`.
///
/// `now` is truncated to the start of its `interval` bar before comparing.
/// Only instruments with at least one stored candle get an entry; callers
/// apply their own lookback to instruments that were never fetched. A last
/// candle dated after `now` reports zero missing bars.
///
/// # Examples
/// ```
/// use candlefill_core::{Candle, CandleStore, Decimal, Interval, analyze_gaps};
/// use chrono::{TimeZone, Utc};
///
/// let last = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// let store = CandleStore::from_candles(vec![Candle {
///     instrument_id: "P1".into(),
///     ts: last,
///     open: Decimal::ONE,
///     high: Decimal::ONE,
///     low: Decimal::ONE,
///     close: Decimal::ONE,
///     volume: Decimal::ZERO,
/// }]);
/// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 45, 30).unwrap();
/// let report = analyze_gaps(&store, now, Interval::Minute);
/// assert_eq!(report.get("P1").unwrap().minutes_missing, 45);
/// assert!(report.get("P2").is_none());
/// ```
#[must_use]
pub fn analyze_gaps(store: &CandleStore, now: DateTime<Utc>, interval: Interval) -> GapReport {
    let now = interval.truncate(now);
    let entries = group_by_instrument(store.candles())
        .filter_map(|series| {
            let last = series.last()?.ts;
            Some(GapEntry {
                instrument_id: series.instrument_id.to_string(),
                last_timestamp: Some(last),
                minutes_missing: interval.units_between(last, now),
            })
        })
        .collect();
    GapReport::new(entries)
}
