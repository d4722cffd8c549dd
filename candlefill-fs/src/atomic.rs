use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use candlefill_core::IngestError;

/// Replace `path` with whatever `write` produces, or leave it untouched.
///
/// The content goes to a temporary file in the same directory, is synced to
/// disk, and is then renamed over `path`.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<(), IngestError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), IngestError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| IngestError::io(dir, e))?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush().map_err(|e| IngestError::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| IngestError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| IngestError::io(path, e.error))?;
    Ok(())
}
