//! candlefill-gecko
//!
//! `CandleSource` implementation backed by the GeckoTerminal OHLCV endpoint:
//!
//! `GET {base_url}/networks/{network}/pools/{pool}/ohlcv/{minute|hour}?limit=&page=`
//!
//! One call issues exactly one HTTP request. Status `200` is decoded, `429`
//! maps to `SourceError::RateLimited` and any other status to
//! `SourceError::Rejected`; retrying is left to `candlefill_core::PageFetcher`.
#![warn(missing_docs)]

/// Response body decoding.
pub mod parse;

use async_trait::async_trait;
use candlefill_core::{
    CandleSource, IngestError, Page, PageRequest, SourceConfig, SourceError,
};
use url::Url;

pub use parse::parse_ohlcv;

// Longest response body kept in a `Rejected` error.
const MAX_ERROR_BODY: usize = 256;

/// GeckoTerminal pool OHLCV source.
#[derive(Debug, Clone)]
pub struct GeckoSource {
    client: reqwest::Client,
    base: Url,
    network: String,
}

impl GeckoSource {
    /// Name reported in logs and errors.
    pub const NAME: &'static str = "geckoterminal";

    /// Build a source from configuration, with its own HTTP client.
    ///
    /// # Errors
    /// Returns `IngestError::Config` when the base URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(cfg: &SourceConfig) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("candlefill/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::config(format!("http client: {e}")))?;
        Self::with_client(client, cfg)
    }

    /// Build a source around an existing HTTP client.
    ///
    /// # Errors
    /// Returns `IngestError::Config` when the base URL is invalid.
    pub fn with_client(client: reqwest::Client, cfg: &SourceConfig) -> Result<Self, IngestError> {
        let base = Url::parse(cfg.base_url.trim())
            .map_err(|e| IngestError::config(format!("source.base_url: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(IngestError::config(format!(
                "source.base_url '{base}' cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            base,
            network: cfg.network.trim().to_string(),
        })
    }

    /// Full request URL for one page.
    #[must_use]
    pub fn page_url(&self, req: &PageRequest) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "networks",
                self.network.as_str(),
                "pools",
                req.instrument_id.as_str(),
                "ohlcv",
                req.interval.as_str(),
            ]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("limit", &req.limit.to_string())
            .append_pair("page", &req.page.to_string());
        url
    }
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl CandleSource for GeckoSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_page(&self, req: &PageRequest) -> Result<Page, SourceError> {
        let url = self.page_url(req);
        tracing::trace!(%url, "ohlcv request");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        if status != reqwest::StatusCode::OK {
            return Err(SourceError::rejected(status.as_u16(), truncate_body(&body)));
        }
        parse_ohlcv(&req.instrument_id, &body)
    }
}
