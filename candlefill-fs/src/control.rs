use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use candlefill_core::ControlSource;

/// Run/stop flags kept in a one-row CSV file, one column per component.
///
/// The file is re-read on every query so another process can flip a flag
/// while a loop runs. A missing file, a missing column or a blank cell
/// means "ON".
#[derive(Debug, Clone)]
pub struct CsvControlFile {
    path: PathBuf,
}

impl CsvControlFile {
    /// Control file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the control file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_flag(&self, name: &str) -> Result<Option<String>, String> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.to_string()),
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);
        let headers = reader.headers().map_err(|e| e.to_string())?.clone();
        let Some(col) = headers.iter().position(|h| h == name) else {
            return Ok(None);
        };
        match reader.records().next() {
            Some(Ok(row)) => Ok(row.get(col).map(str::to_string)),
            Some(Err(e)) => Err(e.to_string()),
            None => Ok(None),
        }
    }
}

impl ControlSource for CsvControlFile {
    fn is_enabled(&self, name: &str) -> bool {
        match self.read_flag(name) {
            Ok(None) => true,
            Ok(Some(value)) => {
                let value = value.trim();
                if value.is_empty() || value.eq_ignore_ascii_case("ON") {
                    true
                } else {
                    if !value.eq_ignore_ascii_case("OFF") {
                        tracing::warn!(
                            component = name,
                            value,
                            "unrecognized control value; treating as OFF"
                        );
                    }
                    false
                }
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    component = name,
                    error = %error,
                    "control file unreadable; treating as ON"
                );
                true
            }
        }
    }
}
