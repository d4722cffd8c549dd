//! Report envelopes produced by merges, rotations and backfills.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of folding a batch of rows into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Rows offered to the merge.
    pub incoming: usize,
    /// Keys that did not exist before the merge.
    pub added: usize,
    /// Store size after the merge.
    pub total: usize,
}

/// What happened to one instrument during a rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum InstrumentOutcome {
    /// No bars were missing; no request was issued.
    UpToDate,
    /// Pages were fetched and merged into the store.
    Merged {
        /// Pages that returned rows.
        pages: u32,
        /// Merge bookkeeping.
        summary: MergeSummary,
    },
    /// The upstream returned no rows for the first page.
    NoData,
    /// Nothing could be fetched because of a transient or upstream failure.
    Skipped {
        /// Human-readable reason.
        reason: String,
    },
    /// Fetched rows could not be merged.
    Failed {
        /// Human-readable reason.
        reason: String,
    },
}

/// Per-instrument line of a [`RotationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentReport {
    /// Instrument processed.
    pub instrument_id: String,
    /// Bars the loop set out to fetch.
    pub deficit: u64,
    /// Outcome of the attempt.
    pub outcome: InstrumentOutcome,
}

/// Summary of one pass over the instrument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationReport {
    /// Bar-aligned instant the deficits were measured against.
    pub started_at: DateTime<Utc>,
    /// Instruments processed, in list order.
    pub instruments: Vec<InstrumentReport>,
    /// True when the run signal was off at the start of, or during, the rotation.
    pub stopped: bool,
}

impl RotationReport {
    /// Total rows added to the store during the rotation.
    #[must_use]
    pub fn rows_added(&self) -> usize {
        self.instruments
            .iter()
            .map(|r| match &r.outcome {
                InstrumentOutcome::Merged { summary, .. } => summary.added,
                _ => 0,
            })
            .sum()
    }
}

/// What happened to one instrument during a bulk backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BackfillOutcome {
    /// Listed in the resume ledger; no request was issued.
    AlreadyDone,
    /// The walk reached the end of the series (or the configured depth) and
    /// the instrument was marked done.
    Completed {
        /// Pages that returned rows.
        pages: u32,
        /// Merge bookkeeping.
        summary: MergeSummary,
    },
    /// Some pages were fetched and merged but the walk stopped early; the
    /// instrument stays eligible for the next run.
    Incomplete {
        /// Pages that returned rows.
        pages: u32,
        /// Merge bookkeeping.
        summary: MergeSummary,
        /// Why the walk stopped.
        reason: String,
    },
    /// The upstream had no rows for this instrument.
    NoData,
    /// Nothing usable was fetched, or the merge failed.
    Failed {
        /// Human-readable reason.
        reason: String,
    },
}

/// Per-instrument line of a [`BackfillReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillEntry {
    /// Instrument processed.
    pub instrument_id: String,
    /// Outcome of the walk.
    pub outcome: BackfillOutcome,
}

/// Summary of a bulk backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Instruments processed, in list order.
    pub entries: Vec<BackfillEntry>,
    /// True when the run signal turned off before the list was exhausted.
    pub stopped: bool,
}

impl BackfillReport {
    /// Instruments newly marked done during this run.
    #[must_use]
    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e.outcome {
            BackfillOutcome::Completed { .. } => Some(e.instrument_id.as_str()),
            _ => None,
        })
    }

    /// Instruments skipped because the ledger already listed them.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, BackfillOutcome::AlreadyDone))
            .count()
    }
}
