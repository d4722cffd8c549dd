use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use candlefill_core::{IngestError, StatusSink};

use crate::atomic::write_atomic;

/// Heartbeat file holding a single `last_run` row.
#[derive(Debug, Clone)]
pub struct CsvStatusFile {
    path: PathBuf,
}

impl CsvStatusFile {
    /// Status file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the status file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last recorded heartbeat, if the file holds one.
    #[must_use]
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        let mut reader = csv::Reader::from_path(&self.path).ok()?;
        let col = reader.headers().ok()?.iter().position(|h| h.trim() == "last_run")?;
        let row = reader.records().next()?.ok()?;
        crate::store::parse_time(row.get(col)?)
    }
}

impl StatusSink for CsvStatusFile {
    fn record_heartbeat(&self, at: DateTime<Utc>) -> Result<(), IngestError> {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        write_atomic(&self.path, |out| {
            let mut writer = csv::Writer::from_writer(out);
            writer
                .write_record(["last_run"])
                .map_err(|e| IngestError::io(&self.path, e))?;
            writer
                .write_record([stamp.as_str()])
                .map_err(|e| IngestError::io(&self.path, e))?;
            writer.flush().map_err(|e| IngestError::io(&self.path, e))
        })
    }
}
