//! Process-level settings read from a TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use candlefill_core::{
    BackfillConfig, CandlefillConfig, IngestConfig, IngestError, RetryPolicy, SourceConfig,
};

/// Locations of every durable file the binary reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Candle store.
    pub store: PathBuf,
    /// Instrument list tracked by the steady-state loop.
    pub instruments: PathBuf,
    /// Column of [`PathsConfig::instruments`] holding the identifiers.
    pub instrument_column: String,
    /// Resume ledger of the backfill.
    pub ledger: PathBuf,
    /// Run/stop control record.
    pub control: PathBuf,
    /// Heartbeat record.
    pub status: PathBuf,
    /// Where the backfill writes the instruments it has completed, if anywhere.
    pub tracked_out: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store: "all_pairs_ohlc.csv".into(),
            instruments: "filtered_contracts.csv".into(),
            instrument_column: "PairId".into(),
            ledger: "fetched_pairs.csv".into(),
            control: "master_control.csv".into(),
            status: "dataloop_status.csv".into(),
            tracked_out: None,
        }
    }
}

/// Everything the binary needs, as read from `candlefill.toml`.
///
/// Every table and key is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upstream connection.
    pub source: SourceConfig,
    /// Retry budget and cooldown.
    pub retry: RetryPolicy,
    /// Steady-state loop.
    pub ingest: IngestConfig,
    /// Bulk backfill.
    pub backfill: BackfillConfig,
    /// File locations.
    pub paths: PathsConfig,
}

impl Settings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    /// Returns `Config` when the text is not valid TOML for [`Settings`].
    pub fn from_toml(text: &str) -> Result<Self, IngestError> {
        toml::from_str(text).map_err(|e| IngestError::config(e.to_string()))
    }

    /// Load settings from `path`, or the defaults when no path is given.
    ///
    /// # Errors
    /// Returns `Config` when the file cannot be read or parsed, or when the
    /// resulting pipeline configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, IngestError> {
        let settings = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| IngestError::config(format!("{}: {e}", p.display())))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        settings
            .pipeline()
            .validate()
            .map_err(IngestError::config)?;
        Ok(settings)
    }

    /// Pipeline configuration carried by these settings.
    #[must_use]
    pub fn pipeline(&self) -> CandlefillConfig {
        CandlefillConfig {
            source: self.source.clone(),
            retry: self.retry,
            ingest: self.ingest.clone(),
            backfill: self.backfill.clone(),
        }
    }
}
