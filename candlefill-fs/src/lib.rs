//! candlefill-fs
//!
//! File adapters for the candlefill storage seams. Every file is plain CSV
//! with a header row:
//!
//! - [`CsvCandleRepository`]: `instrument_id,time,open,high,low,close,volume`,
//!   rewritten through a temporary file and an atomic rename.
//! - [`CsvResumeLedger`]: one `instrument_id` column, append-only.
//! - [`CsvControlFile`]: one column per component holding `ON`/`OFF`.
//! - [`CsvStatusFile`]: a single `last_run` row.
//! - [`CsvInstrumentList`]: any CSV with an identifier column.
//!
//! One process at a time may write a given store or ledger; the adapters
//! take no cross-process locks.

mod atomic;
mod control;
mod instruments;
mod ledger;
mod status;
mod store;

pub use crate::control::CsvControlFile;
pub use crate::instruments::{
    CsvInstrumentList, DEFAULT_INSTRUMENT_COLUMN, load_instrument_list, write_instrument_list,
};
pub use crate::ledger::{CsvResumeLedger, LEDGER_COLUMN};
pub use crate::status::CsvStatusFile;
pub use crate::store::{CsvCandleRepository, STORE_HEADER};
