use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use candlefill_core::{IngestError, ResumeLedger};

/// Column written by this ledger.
pub const LEDGER_COLUMN: &str = "instrument_id";

// Older ledgers used the instrument list's column name.
const LEGACY_COLUMNS: [&str; 2] = ["PairId", "pair_id"];

/// Append-only CSV ledger of instruments whose history walk completed.
///
/// The file is read once when the ledger is opened; marks are appended and
/// also kept in memory, so `contains` never touches the disk.
#[derive(Debug)]
pub struct CsvResumeLedger {
    path: PathBuf,
    done: Mutex<HashSet<String>>,
}

impl CsvResumeLedger {
    /// Open the ledger at `path`; a missing file is an empty ledger.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let path = path.into();
        let done = read_ids(&path)?;
        tracing::debug!(path = %path.display(), entries = done.len(), "ledger opened");
        Ok(Self {
            path,
            done: Mutex::new(done),
        })
    }

    /// Location of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of instruments marked done.
    #[must_use]
    pub fn len(&self) -> usize {
        self.done.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing has been marked done yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_ids(path: &Path) -> Result<HashSet<String>, IngestError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(IngestError::io(path, e)),
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let headers = reader.headers().map_err(|e| IngestError::io(path, e))?.clone();
    let col = headers
        .iter()
        .position(|h| h == LEDGER_COLUMN || LEGACY_COLUMNS.contains(&h))
        .unwrap_or(0);

    let mut ids = HashSet::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::io(path, e))?;
        if let Some(id) = record.get(col).map(str::trim).filter(|s| !s.is_empty()) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

impl ResumeLedger for CsvResumeLedger {
    fn contains(&self, instrument_id: &str) -> bool {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(instrument_id)
    }

    fn mark_done(&self, instrument_id: &str) -> Result<(), IngestError> {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        if done.contains(instrument_id) {
            return Ok(());
        }

        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IngestError::io(&self.path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer
                .write_record([LEDGER_COLUMN])
                .map_err(|e| IngestError::io(&self.path, e))?;
        }
        writer
            .write_record([instrument_id])
            .map_err(|e| IngestError::io(&self.path, e))?;
        writer.flush().map_err(|e| IngestError::io(&self.path, e))?;
        if let Ok(file) = writer.into_inner() {
            file.sync_all().map_err(|e| IngestError::io(&self.path, e))?;
        }

        done.insert(instrument_id.to_string());
        tracing::info!(instrument = instrument_id, "marked done in ledger");
        Ok(())
    }
}
