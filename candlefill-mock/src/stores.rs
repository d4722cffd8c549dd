use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use candlefill_core::{
    Candle, CandleRepository, CandleStore, ControlSource, IngestError, InstrumentSource,
    ResumeLedger, StatusSink,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory candle repository that counts loads and saves.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    store: Mutex<CandleStore>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    fail_saves: Mutex<Option<String>>,
}

impl MemoryRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-loaded with `candles`.
    #[must_use]
    pub fn with_candles(candles: Vec<Candle>) -> Self {
        let me = Self::default();
        *lock(&me.store) = CandleStore::from_candles(candles);
        me
    }

    /// Current contents.
    #[must_use]
    pub fn contents(&self) -> CandleStore {
        lock(&self.store).clone()
    }

    /// Number of `load` calls so far.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of successful `save` calls so far.
    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every following `save` fail with `msg`; `None` restores saving.
    pub fn fail_saves(&self, msg: Option<&str>) {
        *lock(&self.fail_saves) = msg.map(str::to_string);
    }
}

impl CandleRepository for MemoryRepository {
    fn load(&self) -> Result<CandleStore, IngestError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.store).clone())
    }

    fn save(&self, store: &CandleStore) -> Result<(), IngestError> {
        if let Some(msg) = lock(&self.fail_saves).clone() {
            return Err(IngestError::io("memory", msg));
        }
        *lock(&self.store) = store.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory resume ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    done: Mutex<BTreeSet<String>>,
}

impl MemoryLedger {
    /// Ledger already listing `ids`.
    #[must_use]
    pub fn with_done<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            done: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    /// Sorted snapshot of the marked instruments.
    #[must_use]
    pub fn done(&self) -> Vec<String> {
        lock(&self.done).iter().cloned().collect()
    }
}

impl ResumeLedger for MemoryLedger {
    fn contains(&self, instrument_id: &str) -> bool {
        lock(&self.done).contains(instrument_id)
    }

    fn mark_done(&self, instrument_id: &str) -> Result<(), IngestError> {
        lock(&self.done).insert(instrument_id.to_string());
        Ok(())
    }
}

/// Control double whose switches can be flipped by tests, optionally after a
/// number of queries.
#[derive(Debug, Default)]
pub struct SwitchControl {
    off: Mutex<BTreeSet<String>>,
    // name -> queries still answered "on" before switching off
    countdown: Mutex<HashMap<String, usize>>,
    queries: AtomicUsize,
}

impl SwitchControl {
    /// Everything enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn `name` on or off immediately.
    pub fn set(&self, name: &str, enabled: bool) {
        let mut off = lock(&self.off);
        if enabled {
            off.remove(name);
        } else {
            off.insert(name.to_string());
        }
        lock(&self.countdown).remove(name);
    }

    /// Answer "on" for `name` `queries` more times, then "off".
    pub fn off_after(&self, name: &str, queries: usize) {
        if queries == 0 {
            self.set(name, false);
        } else {
            lock(&self.countdown).insert(name.to_string(), queries);
        }
    }

    /// Total `is_enabled` queries received.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl ControlSource for SwitchControl {
    fn is_enabled(&self, name: &str) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if lock(&self.off).contains(name) {
            return false;
        }
        let expired = {
            let mut countdown = lock(&self.countdown);
            match countdown.get_mut(name) {
                Some(0) => {
                    countdown.remove(name);
                    true
                }
                Some(left) => {
                    *left -= 1;
                    false
                }
                None => false,
            }
        };
        if expired {
            lock(&self.off).insert(name.to_string());
            return false;
        }
        true
    }
}

/// Status sink that records every heartbeat.
#[derive(Debug, Default)]
pub struct RecordingStatus {
    beats: Mutex<Vec<DateTime<Utc>>>,
}

impl RecordingStatus {
    /// Heartbeats recorded so far.
    #[must_use]
    pub fn beats(&self) -> Vec<DateTime<Utc>> {
        lock(&self.beats).clone()
    }
}

impl StatusSink for RecordingStatus {
    fn record_heartbeat(&self, at: DateTime<Utc>) -> Result<(), IngestError> {
        lock(&self.beats).push(at);
        Ok(())
    }
}

/// Instrument list that always fails to load, as a missing input file does.
#[derive(Debug, Clone, Default)]
pub struct MissingInstruments;

impl InstrumentSource for MissingInstruments {
    fn load(&self) -> Result<Vec<String>, IngestError> {
        Err(IngestError::missing_input("instrument list"))
    }
}
