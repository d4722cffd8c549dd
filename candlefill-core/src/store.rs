use std::sync::Arc;

use crate::storage::CandleRepository;
use crate::timeseries::merge::merge_store;
use crate::{Candle, CandleStore, IngestError, MergeSummary};

/// Read-modify-write access to the persisted candle store.
///
/// Every merge reloads the store, folds the new rows in and hands the whole
/// result back to the repository. One process at a time may write a given
/// store; nothing here locks across processes.
#[derive(Clone)]
pub struct MergeStore {
    repo: Arc<dyn CandleRepository>,
}

impl std::fmt::Debug for MergeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeStore").finish_non_exhaustive()
    }
}

impl MergeStore {
    /// Wrap a repository.
    pub fn new(repo: Arc<dyn CandleRepository>) -> Self {
        Self { repo }
    }

    /// Current persisted contents.
    ///
    /// # Errors
    /// Propagates repository load failures.
    pub fn snapshot(&self) -> Result<CandleStore, IngestError> {
        self.repo.load()
    }

    /// Merge `rows` into the persisted store and save the result.
    ///
    /// An empty batch is a no-op that does not touch the repository.
    ///
    /// # Errors
    /// Propagates repository load or save failures; on error the persisted
    /// store is left as it was.
    pub fn merge(&self, rows: Vec<Candle>) -> Result<MergeSummary, IngestError> {
        if rows.is_empty() {
            return Ok(MergeSummary::default());
        }
        let current = self.repo.load()?;
        let (merged, summary) = merge_store(&current, rows);
        self.repo.save(&merged)?;
        tracing::debug!(
            incoming = summary.incoming,
            added = summary.added,
            total = summary.total,
            "store merged"
        );
        Ok(summary)
    }
}
