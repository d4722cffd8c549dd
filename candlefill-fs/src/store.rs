use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ByteRecord;
use rust_decimal::Decimal;
use serde::Deserialize;

use candlefill_core::{Candle, CandleRepository, CandleStore, IngestError};

use crate::atomic::write_atomic;

/// Header written at the top of every store file.
pub const STORE_HEADER: [&str; 7] = [
    "instrument_id",
    "time",
    "open",
    "high",
    "low",
    "close",
    "volume",
];

/// Candle store kept in a single CSV file, rewritten whole on every save.
///
/// Rows that do not parse as candles are left out of the loaded store but
/// written back after the candles on every save, so a rewrite never loses
/// them.
#[derive(Debug, Clone)]
pub struct CsvCandleRepository {
    path: PathBuf,
}

// Every field is read as text so one bad cell drops its row, not the file.
#[derive(Debug, Deserialize)]
struct RawRow {
    instrument_id: String,
    time: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

// Contents of a store file.
struct Scan {
    candles: Vec<Candle>,
    // Rows that failed to parse, in `STORE_HEADER` column order.
    unparsed: Vec<ByteRecord>,
}

impl RawRow {
    fn into_candle(self) -> Option<Candle> {
        let instrument_id = self.instrument_id.trim().to_string();
        if instrument_id.is_empty() {
            return None;
        }
        Some(Candle {
            instrument_id,
            ts: parse_time(&self.time)?,
            open: parse_decimal(&self.open)?,
            high: parse_decimal(&self.high)?,
            low: parse_decimal(&self.low)?,
            close: parse_decimal(&self.close)?,
            volume: parse_decimal(&self.volume)?,
        })
    }
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[+offset]` (read as UTC when the
/// offset is absent) and integer epoch seconds.
pub(crate) fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

impl CsvCandleRepository {
    /// Repository backed by `path`. The file is created on the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan(&self, file: File) -> Result<Scan, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);
        let headers = reader
            .byte_headers()
            .map_err(|e| IngestError::io(&self.path, e))?;
        let columns = column_map(headers);
        let store_headers = ByteRecord::from(STORE_HEADER.to_vec());

        let mut scan = Scan {
            candles: Vec::new(),
            unparsed: Vec::new(),
        };
        for record in reader.byte_records() {
            let record = record.map_err(|e| IngestError::io(&self.path, e))?;
            let row: ByteRecord = columns
                .iter()
                .map(|idx| idx.and_then(|i| record.get(i)).unwrap_or_default())
                .collect();
            match row
                .deserialize::<RawRow>(Some(&store_headers))
                .ok()
                .and_then(RawRow::into_candle)
            {
                Some(c) => scan.candles.push(c),
                None => scan.unparsed.push(row),
            }
        }
        Ok(scan)
    }

    fn open(&self) -> Result<Option<File>, IngestError> {
        match File::open(&self.path) {
            Ok(f) => Ok(Some(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IngestError::io(&self.path, e)),
        }
    }
}

// Position of each `STORE_HEADER` column in the file; `pair_id` is accepted
// for `instrument_id`.
fn column_map(headers: &ByteRecord) -> [Option<usize>; 7] {
    STORE_HEADER.map(|name| {
        headers.iter().position(|h| {
            h == name.as_bytes() || (name == "instrument_id" && h == b"pair_id".as_slice())
        })
    })
}

impl CandleRepository for CsvCandleRepository {
    fn load(&self) -> Result<CandleStore, IngestError> {
        let Some(file) = self.open()? else {
            return Ok(CandleStore::new());
        };
        let scan = self.scan(file)?;
        if !scan.unparsed.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                skipped = scan.unparsed.len(),
                kept = scan.candles.len(),
                "skipping unparsable store rows; they stay in the file"
            );
        }
        Ok(CandleStore::from_candles(scan.candles))
    }

    fn save(&self, store: &CandleStore) -> Result<(), IngestError> {
        let carried = match self.open()? {
            Some(file) => self.scan(file)?.unparsed,
            None => Vec::new(),
        };
        write_atomic(&self.path, |out| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(out);
            writer
                .write_record(STORE_HEADER)
                .map_err(|e| IngestError::io(&self.path, e))?;
            for c in store.candles() {
                writer
                    .serialize(c)
                    .map_err(|e| IngestError::io(&self.path, e))?;
            }
            for row in &carried {
                writer
                    .write_byte_record(row)
                    .map_err(|e| IngestError::io(&self.path, e))?;
            }
            writer.flush().map_err(|e| IngestError::io(&self.path, e))
        })?;
        tracing::debug!(
            path = %self.path.display(),
            rows = store.len(),
            carried = carried.len(),
            "store saved"
        );
        Ok(())
    }
}
