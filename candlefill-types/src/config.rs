//! Configuration types shared by the fetcher, the ingestion loop and the backfill.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::interval::Interval;

/// Serde adapter storing a [`Duration`] as whole seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as seconds.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    /// Deserialize from seconds.
    ///
    /// # Errors
    /// Fails when the value is not an unsigned integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
pub mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as milliseconds.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize from milliseconds.
    ///
    /// # Errors
    /// Fails when the value is not an unsigned integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Connection settings for the upstream candle API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// API root, without a trailing path for the network.
    pub base_url: String,
    /// Network segment of the endpoint (e.g. `solana`).
    pub network: String,
    /// Per-request timeout.
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    /// Hard cap on rows per request accepted by the upstream.
    pub max_page_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.geckoterminal.com/api/v2".into(),
            network: "solana".into(),
            timeout: Duration::from_secs(30),
            max_page_size: 1000,
        }
    }
}

/// How rate-limit responses are surfaced to the caller of a page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RetryDiscipline {
    /// Rate limits and transport failures consume a per-call budget; an
    /// exhausted budget degrades to an empty page.
    #[default]
    Bounded,
    /// After the cooldown a rate-limited page is handed back to the caller,
    /// which decides whether to re-issue it or move on. Transport failures
    /// still use the bounded budget.
    PageWalk,
}

/// Verdict of [`RetryPolicy::classify`] for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait the cooldown and try again.
    Retry,
    /// Give up on this request immediately.
    Abort,
}

/// Retry and backoff settings for page requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per page request, including the first one (>= 1).
    pub max_attempts: u32,
    /// Fixed wait applied before a retry.
    #[serde(rename = "cooldown_secs", with = "duration_secs")]
    pub cooldown: Duration,
    /// Random jitter percentage [0, 100] added to each cooldown.
    pub jitter_percent: u8,
    /// Rate-limit handling discipline.
    pub discipline: RetryDiscipline,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown: Duration::from_secs(7),
            jitter_percent: 0,
            discipline: RetryDiscipline::Bounded,
        }
    }
}

impl RetryPolicy {
    /// Same policy with a different discipline.
    #[must_use]
    pub const fn with_discipline(mut self, discipline: RetryDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Map a request failure to retry or abort.
    ///
    /// Rate limits and transport errors are retried; upstream rejections and
    /// undecodable bodies are not.
    #[must_use]
    pub const fn classify(&self, err: &SourceError) -> RetryDecision {
        if err.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::Abort
        }
    }
}

/// Settings for the steady-state gap-filling loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Candle cadence stored and fetched by the loop.
    pub interval: Interval,
    /// Deficit assumed for an instrument with no stored candles.
    pub max_lookback: u64,
    /// Largest page requested per call.
    pub max_page_size: u32,
    /// Pause after every successful page request.
    #[serde(rename = "pacing_ms", with = "duration_millis")]
    pub pacing: Duration,
    /// Idle time between rotations.
    #[serde(rename = "rotation_secs", with = "duration_secs")]
    pub rotation_interval: Duration,
    /// Key of this component in the run/stop control record.
    pub component: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Minute,
            max_lookback: 200,
            max_page_size: 200,
            pacing: Duration::from_millis(250),
            rotation_interval: Duration::from_secs(20),
            component: "DataLoop".into(),
        }
    }
}

/// What the bulk walk does with a page that came back rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RateLimitPolicy {
    /// Re-issue the same page index after the cooldown.
    #[default]
    RetrySamePage,
    /// Move on to the next page index after the cooldown. Leaves a hole in the
    /// walked history, so the instrument is not marked done.
    SkipPage,
}

/// Settings for the bulk history backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Candle cadence fetched by the walk.
    pub interval: Interval,
    /// Rows requested per page.
    pub page_size: u32,
    /// Deepest page index walked per instrument.
    pub max_pages: u32,
    /// Pause after every successful page request.
    #[serde(rename = "pacing_ms", with = "duration_millis")]
    pub pacing: Duration,
    /// Handling of rate-limited pages.
    pub rate_limit_policy: RateLimitPolicy,
    /// Consecutive rate-limit pauses tolerated on one page before the
    /// instrument is abandoned for this run; unbounded when absent.
    pub max_pauses_per_page: Option<u32>,
    /// Key of this component in the run/stop control record.
    pub component: String,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Minute,
            page_size: 800,
            max_pages: 20,
            pacing: Duration::from_millis(500),
            rate_limit_policy: RateLimitPolicy::RetrySamePage,
            max_pauses_per_page: None,
            component: "Backfill".into(),
        }
    }
}

/// Complete pipeline configuration, constructed once at process start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandlefillConfig {
    /// Upstream connection settings.
    pub source: SourceConfig,
    /// Retry settings shared by both pipelines.
    pub retry: RetryPolicy,
    /// Steady-state loop settings.
    pub ingest: IngestConfig,
    /// Bulk backfill settings.
    pub backfill: BackfillConfig,
}

impl CandlefillConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.base_url.trim().is_empty() {
            return Err("source.base_url must not be empty".into());
        }
        if self.source.network.trim().is_empty() {
            return Err("source.network must not be empty".into());
        }
        if self.source.max_page_size == 0 {
            return Err("source.max_page_size must be at least 1".into());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if self.retry.jitter_percent > 100 {
            return Err("retry.jitter_percent must be within 0..=100".into());
        }
        if self.ingest.max_page_size == 0 {
            return Err("ingest.max_page_size must be at least 1".into());
        }
        if self.ingest.max_page_size > self.source.max_page_size {
            return Err("ingest.max_page_size must not exceed source.max_page_size".into());
        }
        if self.backfill.page_size == 0 {
            return Err("backfill.page_size must be at least 1".into());
        }
        if self.backfill.page_size > self.source.max_page_size {
            return Err("backfill.page_size must not exceed source.max_page_size".into());
        }
        if self.backfill.max_pages == 0 {
            return Err("backfill.max_pages must be at least 1".into());
        }
        Ok(())
    }
}
