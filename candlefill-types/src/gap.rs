//! Per-instrument deficit reports.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How far behind "now" a single instrument's stored series is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapEntry {
    /// Instrument the entry describes.
    pub instrument_id: String,
    /// Latest stored candle, absent for an instrument that was never fetched.
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Whole bars missing up to the reference instant (minutes for the
    /// `minute` interval, hours for `hour`). Never negative.
    pub minutes_missing: u64,
}

/// Deficits for every instrument present in a store snapshot.
///
/// Entries are ordered by `minutes_missing` descending, then by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapReport {
    entries: Vec<GapEntry>,
    index: HashMap<String, usize>,
}

impl GapReport {
    /// Build a report, ordering the entries by deficit (largest first).
    #[must_use]
    pub fn new(mut entries: Vec<GapEntry>) -> Self {
        entries.sort_by(|a, b| {
            b.minutes_missing
                .cmp(&a.minutes_missing)
                .then_with(|| a.instrument_id.cmp(&b.instrument_id))
        });
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.instrument_id.clone(), i))
            .collect();
        Self { entries, index }
    }

    /// Ordered entries.
    #[must_use]
    pub fn entries(&self) -> &[GapEntry] {
        &self.entries
    }

    /// Entry for `instrument_id`, if the instrument has stored candles.
    #[must_use]
    pub fn get(&self, instrument_id: &str) -> Option<&GapEntry> {
        self.index.get(instrument_id).map(|&i| &self.entries[i])
    }

    /// Bars to fetch for `instrument_id`: its reported deficit, or `max_lookback`
    /// when the instrument has never been stored.
    #[must_use]
    pub fn deficit_for(&self, instrument_id: &str, max_lookback: u64) -> u64 {
        self.get(instrument_id)
            .map_or(max_lookback, |e| e.minutes_missing)
    }

    /// Number of instruments in the report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no instrument has stored candles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
