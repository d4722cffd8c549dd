use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use candlefill_core::{
    AlwaysOn, CandleRepository, CandleSource, CandlefillConfig, ControlSource, IngestError,
    InstrumentSource, Interval, MergeStore, NoStatus, PageFetcher, RateLimitPolicy,
    ResumeLedger, RetryDiscipline, RetryPolicy, StaticInstruments, StatusSink,
};

use crate::pipeline::backfill::Backfill;
use crate::pipeline::ingest_loop::IngestionLoop;

/// Source of "now" for gap analysis; replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wired pipeline: one upstream source, one store and their collaborators.
///
/// `Candlefill` is cheap to clone; each call to [`Candlefill::ingestion_loop`]
/// or [`Candlefill::backfill`] hands out a runner sharing the same store.
#[derive(Clone)]
pub struct Candlefill {
    pub(crate) cfg: CandlefillConfig,
    pub(crate) fetcher: PageFetcher,
    pub(crate) store: MergeStore,
    pub(crate) ledger: Option<Arc<dyn ResumeLedger>>,
    pub(crate) control: Arc<dyn ControlSource>,
    pub(crate) status: Arc<dyn StatusSink>,
    pub(crate) instruments: Option<Arc<dyn InstrumentSource>>,
    pub(crate) clock: Clock,
}

impl std::fmt::Debug for Candlefill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candlefill")
            .field("cfg", &self.cfg)
            .field("fetcher", &self.fetcher)
            .field("has_ledger", &self.ledger.is_some())
            .field("has_instruments", &self.instruments.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Candlefill`] pipeline.
pub struct CandlefillBuilder {
    source: Option<Arc<dyn CandleSource>>,
    repository: Option<Arc<dyn CandleRepository>>,
    ledger: Option<Arc<dyn ResumeLedger>>,
    control: Arc<dyn ControlSource>,
    status: Arc<dyn StatusSink>,
    instruments: Option<Arc<dyn InstrumentSource>>,
    clock: Clock,
    cfg: CandlefillConfig,
}

impl Default for CandlefillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CandlefillBuilder {
    /// Create a builder with default configuration.
    ///
    /// A source and a repository are required. Without a control source every
    /// component is enabled; without a status sink heartbeats are dropped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            repository: None,
            ledger: None,
            control: Arc::new(AlwaysOn),
            status: Arc::new(NoStatus),
            instruments: None,
            clock: Arc::new(Utc::now),
            cfg: CandlefillConfig::default(),
        }
    }

    /// Upstream candle source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn CandleSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Durable candle store.
    #[must_use]
    pub fn with_repository(mut self, repo: Arc<dyn CandleRepository>) -> Self {
        self.repository = Some(repo);
        self
    }

    /// Resume ledger; required by [`Candlefill::backfill`] only.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn ResumeLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Run/stop signal.
    #[must_use]
    pub fn with_control(mut self, control: Arc<dyn ControlSource>) -> Self {
        self.control = control;
        self
    }

    /// Heartbeat receiver.
    #[must_use]
    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Instrument list tracked by the steady-state loop.
    #[must_use]
    pub fn with_instruments(mut self, instruments: Arc<dyn InstrumentSource>) -> Self {
        self.instruments = Some(instruments);
        self
    }

    /// Fixed instrument list tracked by the steady-state loop.
    #[must_use]
    pub fn instruments<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_instruments(Arc::new(StaticInstruments::new(ids)))
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: CandlefillConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Retry budget and cooldown for page requests.
    #[must_use]
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.cfg.retry = policy;
        self
    }

    /// Candle cadence for both pipelines.
    #[must_use]
    pub const fn interval(mut self, interval: Interval) -> Self {
        self.cfg.ingest.interval = interval;
        self.cfg.backfill.interval = interval;
        self
    }

    /// Deficit assumed for instruments with no stored candles.
    #[must_use]
    pub const fn max_lookback(mut self, bars: u64) -> Self {
        self.cfg.ingest.max_lookback = bars;
        self
    }

    /// Largest page the steady-state loop requests.
    #[must_use]
    pub const fn max_page_size(mut self, rows: u32) -> Self {
        self.cfg.ingest.max_page_size = rows;
        self
    }

    /// Pause after every successful request of the steady-state loop.
    #[must_use]
    pub const fn pacing(mut self, pacing: Duration) -> Self {
        self.cfg.ingest.pacing = pacing;
        self
    }

    /// Idle time between rotations.
    #[must_use]
    pub const fn rotation_interval(mut self, every: Duration) -> Self {
        self.cfg.ingest.rotation_interval = every;
        self
    }

    /// Handling of rate-limited pages during a backfill walk.
    #[must_use]
    pub const fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.cfg.backfill.rate_limit_policy = policy;
        self
    }

    /// Override the wall clock used for gap analysis.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    /// Returns `Config` when the configuration is invalid or when no source
    /// or repository was registered.
    pub fn build(self) -> Result<Candlefill, IngestError> {
        self.cfg.validate().map_err(IngestError::config)?;
        let source = self.source.ok_or_else(|| {
            IngestError::config("no candle source registered; add one via with_source(...)")
        })?;
        let repo = self.repository.ok_or_else(|| {
            IngestError::config("no repository registered; add one via with_repository(...)")
        })?;

        let fetcher = PageFetcher::new(
            source,
            self.cfg.retry.with_discipline(RetryDiscipline::Bounded),
        )
        .with_max_page_size(self.cfg.source.max_page_size);

        Ok(Candlefill {
            cfg: self.cfg,
            fetcher,
            store: MergeStore::new(repo),
            ledger: self.ledger,
            control: self.control,
            status: self.status,
            instruments: self.instruments,
            clock: self.clock,
        })
    }
}

impl Candlefill {
    /// Start building a new pipeline.
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    ///
    /// let app = candlefill::Candlefill::builder()
    ///     .with_source(Arc::new(GeckoSource::new(&cfg.source)?))
    ///     .with_repository(Arc::new(CsvCandleRepository::new("all_pairs_ohlc.csv")))
    ///     .instruments(["POOL1", "POOL2"])
    ///     .max_lookback(200)
    ///     .build()?;
    /// app.ingestion_loop().run().await?;
    /// ```
    #[must_use]
    pub fn builder() -> CandlefillBuilder {
        CandlefillBuilder::new()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CandlefillConfig {
        &self.cfg
    }

    /// Merge store shared by both pipelines.
    #[must_use]
    pub const fn store(&self) -> &MergeStore {
        &self.store
    }

    /// Steady-state gap-filling loop.
    #[must_use]
    pub fn ingestion_loop(&self) -> IngestionLoop {
        IngestionLoop::new(self)
    }

    /// Bulk history walk.
    ///
    /// # Errors
    /// Returns `Config` when no resume ledger was registered.
    pub fn backfill(&self) -> Result<Backfill, IngestError> {
        let ledger = self.ledger.clone().ok_or_else(|| {
            IngestError::config("backfill needs a resume ledger; add one via with_ledger(...)")
        })?;
        Ok(Backfill::new(self, ledger))
    }
}
