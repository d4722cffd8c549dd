// Shared wiring for pipeline tests.
#![allow(dead_code)]

use std::sync::Arc;

use candlefill::{Candlefill, CandlefillBuilder, Clock};
use candlefill_mock::{
    MemoryLedger, MemoryRepository, RecordingStatus, ScriptController, ScriptedSource,
    SwitchControl,
};
use chrono::{DateTime, TimeZone, Utc};

pub const P1: &str = "P1";
pub const P2: &str = "P2";
pub const P3: &str = "P3";

pub const LOOP: &str = "DataLoop";
pub const BACKFILL: &str = "Backfill";

/// Construct a UTC `DateTime` from components for readability in tests.
pub fn dt(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hh, mm, ss).unwrap()
}

/// Wall clock the tests run at: a few seconds past a minute boundary.
pub fn now() -> DateTime<Utc> {
    dt(2025, 1, 1, 12, 0, 42)
}

/// `now()` truncated to the minute.
pub fn bar_now() -> DateTime<Utc> {
    dt(2025, 1, 1, 12, 0, 0)
}

pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

/// Every collaborator of a pipeline, kept so tests can inspect them.
pub struct Rig {
    pub source: ScriptController,
    pub repo: Arc<MemoryRepository>,
    pub ledger: Arc<MemoryLedger>,
    pub control: Arc<SwitchControl>,
    pub status: Arc<RecordingStatus>,
    builder: CandlefillBuilder,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_repo(MemoryRepository::new())
    }

    pub fn with_repo(repo: MemoryRepository) -> Self {
        let (source, controller) = ScriptedSource::new_with_controller("scripted");
        let repo = Arc::new(repo);
        let ledger = Arc::new(MemoryLedger::default());
        let control = Arc::new(SwitchControl::new());
        let status = Arc::new(RecordingStatus::default());
        let builder = Candlefill::builder()
            .with_source(source)
            .with_repository(repo.clone())
            .with_ledger(ledger.clone())
            .with_control(control.clone())
            .with_status(status.clone())
            .clock(fixed_clock(now()));
        Self {
            source: controller,
            repo,
            ledger,
            control,
            status,
            builder,
        }
    }

    pub fn with_ledger(mut self, ledger: MemoryLedger) -> Self {
        self.ledger = Arc::new(ledger);
        self.builder = self.builder.with_ledger(self.ledger.clone());
        self
    }

    /// Adjust the builder before the pipeline is built.
    pub fn tune(mut self, f: impl FnOnce(CandlefillBuilder) -> CandlefillBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }

    pub fn build(self) -> (Candlefill, Parts) {
        let app = self.builder.build().unwrap();
        (
            app,
            Parts {
                source: self.source,
                repo: self.repo,
                ledger: self.ledger,
                control: self.control,
                status: self.status,
            },
        )
    }
}

pub struct Parts {
    pub source: ScriptController,
    pub repo: Arc<MemoryRepository>,
    pub ledger: Arc<MemoryLedger>,
    pub control: Arc<SwitchControl>,
    pub status: Arc<RecordingStatus>,
}
