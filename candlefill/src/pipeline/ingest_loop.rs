use std::sync::Arc;

use candlefill_core::{
    Candle, ControlSource, IngestConfig, IngestError, InstrumentOutcome, InstrumentReport,
    InstrumentSource, MergeStore, PageFetcher, PageOutcome, RotationReport, StatusSink,
    analyze_gaps,
};

use crate::core::{Candlefill, Clock};

/// Where an [`IngestionLoop`] currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Between rotations.
    #[default]
    Idle,
    /// Scanning the store for deficits.
    ComputingGaps,
    /// Requesting pages for one instrument.
    Fetching {
        /// Instrument being fetched.
        instrument: String,
    },
    /// Folding one instrument's pages into the store.
    Merging {
        /// Instrument being merged.
        instrument: String,
    },
    /// The run signal was off; the loop will not start another rotation.
    Stopped,
}

/// Steady-state controller that keeps every listed instrument up to date.
///
/// Each rotation measures deficits once, fills them instrument by instrument
/// and records a heartbeat. The run signal is polled before the rotation and
/// before each instrument; a request in flight is never interrupted.
pub struct IngestionLoop {
    cfg: IngestConfig,
    fetcher: PageFetcher,
    store: MergeStore,
    control: Arc<dyn ControlSource>,
    status: Arc<dyn StatusSink>,
    instruments: Option<Arc<dyn InstrumentSource>>,
    clock: Clock,
    state: LoopState,
}

impl std::fmt::Debug for IngestionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionLoop")
            .field("cfg", &self.cfg)
            .field("fetcher", &self.fetcher)
            .field("state", &self.state)
            .field("has_instruments", &self.instruments.is_some())
            .finish_non_exhaustive()
    }
}

// Rows gathered for one instrument before the merge.
struct Fill {
    rows: Vec<Candle>,
    pages: u32,
    failure: Option<String>,
}

impl IngestionLoop {
    pub(crate) fn new(app: &Candlefill) -> Self {
        Self {
            cfg: app.cfg.ingest.clone(),
            fetcher: app.fetcher.clone().with_pacing(app.cfg.ingest.pacing),
            store: app.store.clone(),
            control: Arc::clone(&app.control),
            status: Arc::clone(&app.status),
            instruments: app.instruments.clone(),
            clock: Arc::clone(&app.clock),
            state: LoopState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &LoopState {
        &self.state
    }

    fn enabled(&self) -> bool {
        self.control.is_enabled(&self.cfg.component)
    }

    /// Run rotations until the run signal turns off.
    ///
    /// # Errors
    /// Returns the first fatal error (missing instrument list, bad
    /// configuration). Other rotation failures are logged and retried on the
    /// next rotation.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        loop {
            match self.run_once().await {
                Ok(report) if report.stopped => {
                    tracing::info!(component = %self.cfg.component, "run signal off; stopping");
                    return Ok(());
                }
                Ok(report) => {
                    tracing::info!(
                        instruments = report.instruments.len(),
                        rows_added = report.rows_added(),
                        "rotation finished"
                    );
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "fatal error; stopping");
                    return Err(e);
                }
                Err(e) => tracing::warn!(error = %e, "rotation failed"),
            }
            tokio::time::sleep(self.cfg.rotation_interval).await;
        }
    }

    /// Execute a single rotation.
    ///
    /// # Errors
    /// Fails when the instrument list cannot be loaded (fatal) or the store
    /// snapshot cannot be read. Per-instrument failures are reported in the
    /// returned [`RotationReport`] instead.
    #[tracing::instrument(name = "candlefill::ingest::rotation", skip(self))]
    pub async fn run_once(&mut self) -> Result<RotationReport, IngestError> {
        let started_at = self.cfg.interval.truncate((self.clock)());
        if !self.enabled() {
            self.state = LoopState::Stopped;
            return Ok(RotationReport {
                started_at,
                instruments: Vec::new(),
                stopped: true,
            });
        }

        let instruments = match &self.instruments {
            Some(source) => source.load()?,
            None => return Err(IngestError::missing_input("instrument list")),
        };

        self.state = LoopState::ComputingGaps;
        let gaps = match self.store.snapshot() {
            Ok(snapshot) => analyze_gaps(&snapshot, started_at, self.cfg.interval),
            Err(e) => {
                self.state = LoopState::Idle;
                return Err(e);
            }
        };
        tracing::info!(
            tracked = instruments.len(),
            stored = gaps.len(),
            "missing candle summary computed"
        );

        let mut reports = Vec::with_capacity(instruments.len());
        let mut stopped = false;
        for id in instruments {
            if !self.enabled() {
                tracing::info!(instrument = %id, "run signal turned off mid-rotation");
                stopped = true;
                break;
            }
            let deficit = gaps.deficit_for(&id, self.cfg.max_lookback);
            let outcome = if deficit == 0 {
                tracing::debug!(instrument = %id, "already up to date");
                InstrumentOutcome::UpToDate
            } else {
                self.fill_instrument(&id, deficit).await
            };
            reports.push(InstrumentReport {
                instrument_id: id,
                deficit,
                outcome,
            });
        }

        if let Err(e) = self.status.record_heartbeat(started_at) {
            tracing::warn!(error = %e, "failed to record heartbeat");
        }
        self.state = if stopped {
            LoopState::Stopped
        } else {
            LoopState::Idle
        };
        Ok(RotationReport {
            started_at,
            instruments: reports,
            stopped,
        })
    }

    async fn fill_instrument(&mut self, id: &str, deficit: u64) -> InstrumentOutcome {
        tracing::info!(instrument = id, deficit, "fetching missing candles");
        self.state = LoopState::Fetching {
            instrument: id.to_string(),
        };
        let fill = self.fetch_deficit(id, deficit).await;

        if fill.rows.is_empty() {
            return match fill.failure {
                Some(reason) => {
                    tracing::warn!(instrument = id, %reason, "skipped for this rotation");
                    InstrumentOutcome::Skipped { reason }
                }
                None => {
                    tracing::warn!(instrument = id, "no data returned");
                    InstrumentOutcome::NoData
                }
            };
        }

        self.state = LoopState::Merging {
            instrument: id.to_string(),
        };
        match self.store.merge(fill.rows) {
            Ok(summary) => {
                tracing::info!(
                    instrument = id,
                    pages = fill.pages,
                    added = summary.added,
                    total = summary.total,
                    "store updated"
                );
                InstrumentOutcome::Merged {
                    pages: fill.pages,
                    summary,
                }
            }
            Err(e) => {
                tracing::warn!(instrument = id, error = %e, "merge failed");
                InstrumentOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn fetch_deficit(&self, id: &str, deficit: u64) -> Fill {
        let mut fill = Fill {
            rows: Vec::new(),
            pages: 0,
            failure: None,
        };
        let mut remaining = deficit;
        let mut page: u32 = 1;
        let interval = self.cfg.interval;

        while remaining > 0 {
            let size = u32::try_from(remaining.min(u64::from(self.cfg.max_page_size)))
                .unwrap_or(self.cfg.max_page_size);
            let outcome = self.fetcher.fetch(id, page, size, interval).await;
            match outcome {
                PageOutcome::Rows { requested, .. } => {
                    let short = outcome.is_short();
                    fill.rows.extend(outcome.into_candles());
                    fill.pages += 1;
                    // The fetcher may have clamped `size` to the source cap.
                    remaining = remaining.saturating_sub(u64::from(requested));
                    if short {
                        tracing::debug!(instrument = id, page, "short page; upstream exhausted");
                        break;
                    }
                    page += 1;
                }
                PageOutcome::EndOfSeries => {
                    tracing::debug!(instrument = id, page, "no more data");
                    break;
                }
                PageOutcome::RetriesExhausted { attempts, last } => {
                    fill.failure = Some(format!("gave up after {attempts} attempts: {last}"));
                    break;
                }
                PageOutcome::Rejected(err) => {
                    fill.failure = Some(err.to_string());
                    break;
                }
                // Only produced under the page-walk discipline.
                PageOutcome::RateLimited => {
                    fill.failure = Some("rate limited".into());
                    break;
                }
                _ => break,
            }
        }
        fill
    }
}
