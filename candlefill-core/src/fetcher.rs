//! Single-page fetching with retry, cooldown and pacing.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::connector::{CandleSource, Page, PageRequest};
use crate::{Candle, Interval, RetryDecision, RetryDiscipline, RetryPolicy, SourceError};

/// Tagged result of one logical page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PageOutcome {
    /// The upstream returned rows, sorted ascending by timestamp.
    Rows {
        /// Parsed candles.
        candles: Vec<Candle>,
        /// Page size actually requested after clamping.
        requested: u32,
        /// Rows the upstream sent, parsed or not.
        returned: usize,
    },
    /// The upstream answered with zero rows.
    EndOfSeries,
    /// Rate limited under the page-walk discipline; the cooldown has elapsed
    /// and the caller decides whether to re-issue the page.
    RateLimited,
    /// Every attempt of the retry budget failed with a transient error.
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        last: SourceError,
    },
    /// A non-transient failure; not retried.
    Rejected(SourceError),
}

impl PageOutcome {
    /// Rows carried by the outcome; empty for every non-`Rows` variant.
    #[must_use]
    pub fn candles(&self) -> &[Candle] {
        match self {
            Self::Rows { candles, .. } => candles,
            _ => &[],
        }
    }

    /// Consume the outcome and return its rows.
    #[must_use]
    pub fn into_candles(self) -> Vec<Candle> {
        match self {
            Self::Rows { candles, .. } => candles,
            _ => Vec::new(),
        }
    }

    /// True for a `Rows` page where the upstream sent fewer rows than
    /// requested, which means it has nothing older to offer. Rows dropped
    /// while parsing do not make a page short.
    #[must_use]
    pub fn is_short(&self) -> bool {
        match self {
            Self::Rows {
                returned,
                requested,
                ..
            } => *returned < *requested as usize,
            _ => false,
        }
    }

    /// True when pagination for the instrument should stop because the
    /// series is exhausted (empty or short page).
    #[must_use]
    pub fn ends_series(&self) -> bool {
        matches!(self, Self::EndOfSeries) || self.is_short()
    }
}

/// Return `base_ms` plus a random jitter of up to `jitter_percent` percent.
#[must_use]
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}

/// Issues page requests against a [`CandleSource`] under a [`RetryPolicy`].
///
/// The fetcher holds no per-instrument state; one instance serves every
/// instrument of a pipeline.
#[derive(Clone)]
pub struct PageFetcher {
    source: Arc<dyn CandleSource>,
    policy: RetryPolicy,
    pacing: Duration,
    max_page_size: u32,
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("source", &self.source.name())
            .field("policy", &self.policy)
            .field("pacing", &self.pacing)
            .field("max_page_size", &self.max_page_size)
            .finish()
    }
}

impl PageFetcher {
    /// Create a fetcher with no pacing and a page cap of 1000 rows.
    pub fn new(source: Arc<dyn CandleSource>, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            pacing: Duration::ZERO,
            max_page_size: 1000,
        }
    }

    /// Pause applied after every successful request.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Upper bound on rows per request accepted by the upstream.
    #[must_use]
    pub fn with_max_page_size(mut self, max: u32) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// Same fetcher under a different retry discipline.
    #[must_use]
    pub fn with_discipline(mut self, discipline: RetryDiscipline) -> Self {
        self.policy = self.policy.with_discipline(discipline);
        self
    }

    /// Active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Clamp a requested page size into `1..=max_page_size`.
    #[must_use]
    pub fn clamp_page_size(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_page_size)
    }

    /// Fetch one page for `instrument_id`.
    ///
    /// Never returns an error: every failure mode is a [`PageOutcome`]
    /// variant. Transient failures are retried with the policy cooldown until
    /// the attempt budget runs out; no cooldown follows the final attempt.
    pub async fn fetch(
        &self,
        instrument_id: &str,
        page: u32,
        page_size: u32,
        interval: Interval,
    ) -> PageOutcome {
        let limit = self.clamp_page_size(page_size);
        let req = PageRequest::new(instrument_id, page, limit, interval);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.source.fetch_page(&req).await {
                Ok(Page {
                    mut candles,
                    returned,
                }) => {
                    self.pace().await;
                    if returned == 0 {
                        tracing::debug!(instrument = instrument_id, page, "end of series");
                        return PageOutcome::EndOfSeries;
                    }
                    candles.sort_by_key(|c| c.ts);
                    tracing::debug!(
                        instrument = instrument_id,
                        page,
                        rows = candles.len(),
                        returned,
                        requested = limit,
                        "page fetched"
                    );
                    return PageOutcome::Rows {
                        candles,
                        requested: limit,
                        returned,
                    };
                }
                Err(err) => match self.policy.classify(&err) {
                    RetryDecision::Abort => {
                        tracing::warn!(
                            instrument = instrument_id,
                            page,
                            error = %err,
                            "page request rejected"
                        );
                        return PageOutcome::Rejected(err);
                    }
                    RetryDecision::Retry => {
                        let walk_pause = self.policy.discipline == RetryDiscipline::PageWalk
                            && err == SourceError::RateLimited;
                        if !walk_pause && attempt >= max_attempts {
                            tracing::warn!(
                                instrument = instrument_id,
                                page,
                                attempts = attempt,
                                error = %err,
                                "retry budget exhausted"
                            );
                            return PageOutcome::RetriesExhausted {
                                attempts: attempt,
                                last: err,
                            };
                        }
                        tracing::warn!(
                            instrument = instrument_id,
                            page,
                            attempt,
                            error = %err,
                            "transient failure; cooling down"
                        );
                        self.cool_down().await;
                        if walk_pause {
                            return PageOutcome::RateLimited;
                        }
                    }
                },
            }
        }
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }

    async fn cool_down(&self) {
        let base_ms = u64::try_from(self.policy.cooldown.as_millis()).unwrap_or(u64::MAX);
        let wait_ms = jitter_wait(base_ms, u32::from(self.policy.jitter_percent));
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
    }
}
