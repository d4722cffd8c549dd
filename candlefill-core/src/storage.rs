//! Durable state and external collaborator seams.
//!
//! Every trait here is synchronous: the adapters shipped with the workspace
//! work on small local files, and the pipeline calls them between network
//! requests, never concurrently with one.

use chrono::{DateTime, Utc};

use crate::{CandleStore, IngestError};

/// Whole-store persistence with an atomic-replace write discipline.
///
/// `save` must either leave the previous contents intact or replace them
/// completely; readers never observe a partial store.
pub trait CandleRepository: Send + Sync {
    /// Load the current store. A store that was never written loads empty.
    ///
    /// # Errors
    /// Returns an error when the persisted store exists but cannot be read.
    fn load(&self) -> Result<CandleStore, IngestError>;

    /// Replace the persisted store with `store`.
    ///
    /// # Errors
    /// Returns an error when the new contents could not be written.
    fn save(&self, store: &CandleStore) -> Result<(), IngestError>;
}

/// Durable, append-only set of instruments whose history walk completed.
pub trait ResumeLedger: Send + Sync {
    /// True when `instrument_id` was marked done, in this or an earlier run.
    fn contains(&self, instrument_id: &str) -> bool;

    /// Record `instrument_id` as done. Marking twice is a no-op.
    ///
    /// # Errors
    /// Returns an error when the mark could not be persisted.
    fn mark_done(&self, instrument_id: &str) -> Result<(), IngestError>;
}

/// Cross-process run/stop signal.
pub trait ControlSource: Send + Sync {
    /// True while the component named `name` is allowed to run.
    fn is_enabled(&self, name: &str) -> bool;
}

/// Receiver of the end-of-rotation heartbeat.
pub trait StatusSink: Send + Sync {
    /// Record that a rotation finished at `at`.
    ///
    /// # Errors
    /// Returns an error when the heartbeat could not be written.
    fn record_heartbeat(&self, at: DateTime<Utc>) -> Result<(), IngestError>;
}

/// Ordered list of instruments to track.
pub trait InstrumentSource: Send + Sync {
    /// Load the list, de-duplicated in first-occurrence order.
    ///
    /// # Errors
    /// Returns a fatal error when the list is absent or malformed.
    fn load(&self) -> Result<Vec<String>, IngestError>;
}

/// Control source that always reports every component as enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOn;

impl ControlSource for AlwaysOn {
    fn is_enabled(&self, _name: &str) -> bool {
        true
    }
}

/// Status sink that drops every heartbeat.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStatus;

impl StatusSink for NoStatus {
    fn record_heartbeat(&self, _at: DateTime<Utc>) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Fixed in-memory instrument list.
#[derive(Debug, Clone, Default)]
pub struct StaticInstruments(Vec<String>);

impl StaticInstruments {
    /// Build from any list of identifiers; blanks and duplicates are dropped.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(dedup_instruments(ids.into_iter().map(Into::into)))
    }
}

impl InstrumentSource for StaticInstruments {
    fn load(&self) -> Result<Vec<String>, IngestError> {
        Ok(self.0.clone())
    }
}

/// Trim identifiers, drop blanks and keep the first occurrence of each.
pub fn dedup_instruments<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}
