use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use candlefill_core::{IngestError, InstrumentSource, dedup_instruments};

use crate::atomic::write_atomic;

/// Default identifier column of instrument list files.
pub const DEFAULT_INSTRUMENT_COLUMN: &str = "PairId";

/// Read the identifier column of a CSV instrument list.
///
/// Identifiers are trimmed, blanks dropped and duplicates removed keeping the
/// first occurrence.
///
/// # Errors
/// A missing file or a missing `column` is a fatal `MissingInput` error; a
/// file that cannot be parsed is an `Io` error.
pub fn load_instrument_list(path: &Path, column: &str) -> Result<Vec<String>, IngestError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(IngestError::missing_input(format!(
                "instrument list {}",
                path.display()
            )));
        }
        Err(e) => return Err(IngestError::io(path, e)),
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let headers = reader.headers().map_err(|e| IngestError::io(path, e))?.clone();
    let col = headers.iter().position(|h| h == column).ok_or_else(|| {
        IngestError::missing_input(format!(
            "column '{column}' in instrument list {}",
            path.display()
        ))
    })?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::io(path, e))?;
        if let Some(id) = record.get(col) {
            ids.push(id.to_string());
        }
    }
    Ok(dedup_instruments(ids))
}

/// Write `ids` as a one-column CSV instrument list, replacing `path`.
///
/// # Errors
/// Returns an `Io` error when the file cannot be written.
pub fn write_instrument_list(path: &Path, column: &str, ids: &[String]) -> Result<(), IngestError> {
    write_atomic(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record([column])
            .map_err(|e| IngestError::io(path, e))?;
        for id in ids {
            writer
                .write_record([id.as_str()])
                .map_err(|e| IngestError::io(path, e))?;
        }
        writer.flush().map_err(|e| IngestError::io(path, e))
    })
}

/// Instrument list re-read from a CSV file on every `load`.
#[derive(Debug, Clone)]
pub struct CsvInstrumentList {
    path: PathBuf,
    column: String,
}

impl CsvInstrumentList {
    /// List at `path` using the identifier `column`.
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
        }
    }
}

impl InstrumentSource for CsvInstrumentList {
    fn load(&self) -> Result<Vec<String>, IngestError> {
        load_instrument_list(&self.path, &self.column)
    }
}
