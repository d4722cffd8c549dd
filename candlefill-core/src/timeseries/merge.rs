use std::collections::BTreeMap;

use crate::{Candle, CandleKey, CandleStore, MergeSummary};

/// Fold `new_rows` into `store`, returning the replacement store.
///
/// - Rows are keyed by `(instrument_id, ts)`; a new row replaces a stored row
///   with the same key, and among new rows the last one wins.
/// - The result is sorted by `(instrument_id, ts)`.
/// - Merging the same batch twice leaves the store unchanged the second time.
#[must_use]
pub fn merge_store(store: &CandleStore, new_rows: Vec<Candle>) -> (CandleStore, MergeSummary) {
    let before = store.len();
    let incoming = new_rows.len();

    let mut by_key: BTreeMap<CandleKey, Candle> = store
        .candles()
        .iter()
        .map(|c| (c.key(), c.clone()))
        .collect();
    for c in new_rows {
        by_key.insert(c.key(), c);
    }

    // BTreeMap iteration is already key ordered and duplicate free.
    let merged = CandleStore::from_candles(by_key.into_values().collect());
    let total = merged.len();
    (
        merged,
        MergeSummary {
            incoming,
            added: total.saturating_sub(before),
            total,
        },
    )
}
