use async_trait::async_trait;

use crate::{Candle, Interval, SourceError};

/// One page of candles requested from the upstream API.
///
/// `page` is 1-based; page 1 holds the most recent bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Instrument whose candles are requested.
    pub instrument_id: String,
    /// Page index, starting at 1.
    pub page: u32,
    /// Rows requested for this page.
    pub limit: u32,
    /// Candle cadence.
    pub interval: Interval,
}

impl PageRequest {
    /// Convenience constructor.
    pub fn new(instrument_id: impl Into<String>, page: u32, limit: u32, interval: Interval) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            page,
            limit,
            interval,
        }
    }
}

/// Rows decoded from one upstream page.
///
/// `returned` counts the rows the upstream sent, including any the source
/// could not parse, so callers can tell a short page from a full page with
/// bad rows in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Parsed candles, in any order.
    pub candles: Vec<Candle>,
    /// Raw row count of the response.
    pub returned: usize,
}

impl Page {
    /// A page where every returned row parsed.
    #[must_use]
    pub fn new(candles: Vec<Candle>) -> Self {
        let returned = candles.len();
        Self { candles, returned }
    }

    /// A page whose response held `returned` rows, some possibly dropped.
    #[must_use]
    pub fn with_returned(candles: Vec<Candle>, returned: usize) -> Self {
        let returned = returned.max(candles.len());
        Self { candles, returned }
    }

    /// Rows that were returned but could not be parsed.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.returned.saturating_sub(self.candles.len())
    }
}

impl From<Vec<Candle>> for Page {
    fn from(candles: Vec<Candle>) -> Self {
        Self::new(candles)
    }
}

/// A paginated upstream that serves candle pages.
///
/// Implementations issue exactly one request per call and classify its
/// failure; retrying, backoff and pacing live in [`crate::PageFetcher`].
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Stable name used in logs and errors (e.g. "geckoterminal").
    fn name(&self) -> &'static str;

    /// Fetch one page.
    ///
    /// Returns the parsed rows in any order. Rows that could not be parsed
    /// are dropped but still counted in [`Page::returned`]; a page with
    /// `returned == 0` means the upstream has no rows for this request.
    async fn fetch_page(&self, req: &PageRequest) -> Result<Page, SourceError>;
}
