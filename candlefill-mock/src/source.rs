use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use candlefill_core::{Candle, CandleSource, Page, PageRequest, SourceError};

/// Instruction for how one page request should behave.
#[derive(Debug, Clone)]
pub enum PageBehavior {
    /// Return these rows.
    Return(Vec<Candle>),
    /// Return a page as-is, e.g. one whose raw row count exceeds its parsed
    /// candles.
    ReturnPage(Page),
    /// Fail with the provided error.
    Fail(SourceError),
    /// Hang indefinitely (simulate a stalled connection).
    Hang,
}

#[derive(Default)]
struct InternalState {
    // One-shot replies, consumed before falling back to the series.
    queued: HashMap<String, VecDeque<PageBehavior>>,
    // Full history served newest page first.
    series: HashMap<String, Vec<Candle>>,
    calls: Vec<PageRequest>,
}

/// Controller handle used by tests to drive the scripted source.
pub struct ScriptController {
    state: Arc<Mutex<InternalState>>,
}

impl ScriptController {
    /// Queue a one-shot behavior for the next request about `instrument_id`.
    pub async fn push(&self, instrument_id: &str, behavior: PageBehavior) {
        let mut guard = self.state.lock().await;
        guard
            .queued
            .entry(instrument_id.to_string())
            .or_default()
            .push_back(behavior);
    }

    /// Queue the same failure `times` times in a row.
    pub async fn push_failures(&self, instrument_id: &str, err: SourceError, times: usize) {
        for _ in 0..times {
            self.push(instrument_id, PageBehavior::Fail(err.clone())).await;
        }
    }

    /// Serve `candles` as the instrument's full history.
    ///
    /// Page `n` of size `limit` holds the `limit` rows preceding the ones of
    /// page `n - 1`, counted from the newest row; pages past the oldest row
    /// are empty.
    pub async fn set_series(&self, instrument_id: &str, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.ts);
        let mut guard = self.state.lock().await;
        guard.series.insert(instrument_id.to_string(), candles);
    }

    /// Every request received so far, in order.
    pub async fn calls(&self) -> Vec<PageRequest> {
        self.state.lock().await.calls.clone()
    }

    /// Requests received for `instrument_id`.
    pub async fn calls_for(&self, instrument_id: &str) -> Vec<PageRequest> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|r| r.instrument_id == instrument_id)
            .cloned()
            .collect()
    }

    /// Clear every behavior, series and the request log.
    pub async fn clear_all(&self) {
        let mut guard = self.state.lock().await;
        guard.queued.clear();
        guard.series.clear();
        guard.calls.clear();
    }
}

/// A candle source that defers all behavior to a [`ScriptController`].
///
/// Instruments with nothing queued and no series answer with an empty page.
pub struct ScriptedSource {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
}

impl ScriptedSource {
    /// Create a new scripted source and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Arc<dyn CandleSource>, ScriptController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = ScriptController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self { name, state });
        (me as Arc<dyn CandleSource>, controller)
    }
}

fn page_of(series: &[Candle], page: u32, limit: u32) -> Vec<Candle> {
    let limit = limit as usize;
    let skip = (page.max(1) as usize - 1).saturating_mul(limit);
    let end = series.len().saturating_sub(skip);
    let start = end.saturating_sub(limit);
    series[start..end].to_vec()
}

#[async_trait]
impl CandleSource for ScriptedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_page(&self, req: &PageRequest) -> Result<Page, SourceError> {
        // Decide without holding the lock across the hang below
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.calls.push(req.clone());
            let queued = guard
                .queued
                .get_mut(&req.instrument_id)
                .and_then(VecDeque::pop_front);
            queued.unwrap_or_else(|| {
                let rows = guard
                    .series
                    .get(&req.instrument_id)
                    .map(|s| page_of(s, req.page, req.limit))
                    .unwrap_or_default();
                PageBehavior::Return(rows)
            })
        };

        match behavior {
            PageBehavior::Return(rows) => Ok(Page::new(rows)),
            PageBehavior::ReturnPage(page) => Ok(page),
            PageBehavior::Fail(e) => Err(e),
            PageBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
