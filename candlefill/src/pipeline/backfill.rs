use std::sync::Arc;

use candlefill_core::{
    BackfillConfig, BackfillEntry, BackfillOutcome, BackfillReport, Candle, ControlSource,
    IngestError, MergeStore, MergeSummary, PageFetcher, PageOutcome, RateLimitPolicy,
    ResumeLedger, RetryDiscipline,
};

use crate::core::Candlefill;

/// Bulk history walk for instruments not yet listed in the resume ledger.
///
/// Rate-limited pages are handed back by the fetcher after its cooldown, and
/// [`RateLimitPolicy`] decides whether the same page is requested again or the
/// walk moves on.
pub struct Backfill {
    cfg: BackfillConfig,
    fetcher: PageFetcher,
    store: MergeStore,
    ledger: Arc<dyn ResumeLedger>,
    control: Arc<dyn ControlSource>,
}

impl std::fmt::Debug for Backfill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backfill")
            .field("cfg", &self.cfg)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

// How one instrument's page walk ended.
enum WalkEnd {
    // End of series, short page or the configured depth.
    Complete,
    // Stopped early; the reason is reported and the instrument stays pending.
    Aborted(String),
}

struct Walk {
    rows: Vec<Candle>,
    pages: u32,
    skipped_pages: Vec<u32>,
    end: WalkEnd,
}

impl Backfill {
    pub(crate) fn new(app: &Candlefill, ledger: Arc<dyn ResumeLedger>) -> Self {
        Self {
            cfg: app.cfg.backfill.clone(),
            fetcher: app
                .fetcher
                .clone()
                .with_pacing(app.cfg.backfill.pacing)
                .with_discipline(RetryDiscipline::PageWalk),
            store: app.store.clone(),
            ledger,
            control: Arc::clone(&app.control),
        }
    }

    /// Instruments of `candidates` already marked done, in input order.
    #[must_use]
    pub fn tracked(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|id| self.ledger.contains(id))
            .cloned()
            .collect()
    }

    /// Walk every instrument of `instruments` that the ledger does not list.
    ///
    /// Each instrument's pages are merged in one store write; the instrument
    /// is marked done only when the walk completed without skipping a page.
    ///
    /// # Errors
    /// Never fails for per-instrument problems; those are reported in the
    /// returned [`BackfillReport`].
    #[tracing::instrument(name = "candlefill::backfill::run", skip_all, fields(instruments = instruments.len()))]
    pub async fn run(&self, instruments: &[String]) -> Result<BackfillReport, IngestError> {
        let mut report = BackfillReport::default();
        for id in instruments {
            if !self.control.is_enabled(&self.cfg.component) {
                tracing::info!(instrument = %id, "run signal off; stopping backfill");
                report.stopped = true;
                break;
            }
            let outcome = if self.ledger.contains(id) {
                tracing::info!(instrument = %id, "skipping; already fetched");
                BackfillOutcome::AlreadyDone
            } else {
                self.backfill_instrument(id).await
            };
            report.entries.push(BackfillEntry {
                instrument_id: id.clone(),
                outcome,
            });
        }
        Ok(report)
    }

    async fn backfill_instrument(&self, id: &str) -> BackfillOutcome {
        tracing::info!(instrument = id, "walking history");
        let walk = self.walk(id).await;

        if walk.rows.is_empty() {
            return match walk.end {
                WalkEnd::Aborted(reason) => {
                    tracing::warn!(instrument = id, %reason, "backfill failed");
                    BackfillOutcome::Failed { reason }
                }
                WalkEnd::Complete => {
                    tracing::warn!(instrument = id, "no data");
                    BackfillOutcome::NoData
                }
            };
        }

        let summary = match self.store.merge(walk.rows) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(instrument = id, error = %e, "merge failed");
                return BackfillOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let incomplete = |reason: String| {
            tracing::warn!(instrument = id, %reason, "walk incomplete; will retry next run");
            BackfillOutcome::Incomplete {
                pages: walk.pages,
                summary,
                reason,
            }
        };
        match walk.end {
            WalkEnd::Aborted(reason) => incomplete(reason),
            WalkEnd::Complete if !walk.skipped_pages.is_empty() => {
                incomplete(format!("rate-limited pages skipped: {:?}", walk.skipped_pages))
            }
            WalkEnd::Complete => self.complete(id, walk.pages, summary),
        }
    }

    fn complete(&self, id: &str, pages: u32, summary: MergeSummary) -> BackfillOutcome {
        match self.ledger.mark_done(id) {
            Ok(()) => {
                tracing::info!(instrument = id, pages, added = summary.added, "backfill complete");
                BackfillOutcome::Completed { pages, summary }
            }
            Err(e) => {
                tracing::warn!(instrument = id, error = %e, "could not record completion");
                BackfillOutcome::Incomplete {
                    pages,
                    summary,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn walk(&self, id: &str) -> Walk {
        let mut walk = Walk {
            rows: Vec::new(),
            pages: 0,
            skipped_pages: Vec::new(),
            end: WalkEnd::Complete,
        };
        let mut page: u32 = 1;
        let mut pauses: u32 = 0;

        while page <= self.cfg.max_pages {
            let outcome = self
                .fetcher
                .fetch(id, page, self.cfg.page_size, self.cfg.interval)
                .await;
            match outcome {
                PageOutcome::Rows { .. } => {
                    let short = outcome.is_short();
                    walk.rows.extend(outcome.into_candles());
                    walk.pages += 1;
                    if short {
                        break;
                    }
                    page += 1;
                    pauses = 0;
                }
                PageOutcome::EndOfSeries => break,
                PageOutcome::RateLimited => {
                    pauses += 1;
                    match self.cfg.rate_limit_policy {
                        RateLimitPolicy::SkipPage => {
                            tracing::warn!(instrument = id, page, "rate limited; skipping page");
                            walk.skipped_pages.push(page);
                            page += 1;
                            pauses = 0;
                        }
                        _ => {
                            if self.cfg.max_pauses_per_page.is_some_and(|max| pauses >= max) {
                                walk.end = WalkEnd::Aborted(format!(
                                    "rate limited {pauses} times on page {page}"
                                ));
                                break;
                            }
                            tracing::warn!(instrument = id, page, pauses, "rate limited; retrying page");
                        }
                    }
                }
                PageOutcome::RetriesExhausted { attempts, last } => {
                    walk.end = WalkEnd::Aborted(format!(
                        "page {page}: gave up after {attempts} attempts: {last}"
                    ));
                    break;
                }
                PageOutcome::Rejected(err) => {
                    walk.end = WalkEnd::Aborted(format!("page {page}: {err}"));
                    break;
                }
                _ => {
                    walk.end = WalkEnd::Aborted(format!("page {page}: unexpected outcome"));
                    break;
                }
            }
        }
        walk
    }
}
