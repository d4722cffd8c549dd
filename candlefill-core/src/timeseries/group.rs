use crate::Candle;

/// One instrument's contiguous run inside a sorted candle slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentSeries<'a> {
    /// Identifier shared by every candle of the run.
    pub instrument_id: &'a str,
    /// Candles of the run, in input order.
    pub candles: &'a [Candle],
}

impl InstrumentSeries<'_> {
    /// Latest timestamp of the run.
    ///
    /// Assumes the run is sorted by timestamp, as runs taken from a
    /// [`crate::CandleStore`] are.
    #[must_use]
    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }
}

/// Split `candles` into one sub-slice per instrument.
///
/// Input must already be sorted by instrument id (as [`crate::CandleStore`]
/// guarantees); otherwise the same instrument yields several runs.
pub fn group_by_instrument(candles: &[Candle]) -> impl Iterator<Item = InstrumentSeries<'_>> {
    candles
        .chunk_by(|a, b| a.instrument_id == b.instrument_id)
        .map(|run| InstrumentSeries {
            instrument_id: run[0].instrument_id.as_str(),
            candles: run,
        })
}
