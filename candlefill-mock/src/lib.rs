//! Test doubles for the candlefill pipeline.
//!
//! - [`ScriptedSource`] answers page requests from a per-instrument script or
//!   a full history, and logs every request.
//! - [`MemoryRepository`], [`MemoryLedger`], [`SwitchControl`],
//!   [`RecordingStatus`] and [`MissingInstruments`] stand in for the file
//!   adapters.
//! - [`fixtures`] builds deterministic candles.
#![warn(missing_docs)]

/// Deterministic candle builders.
pub mod fixtures;
mod source;
mod stores;

pub use source::{PageBehavior, ScriptController, ScriptedSource};
pub use stores::{
    MemoryLedger, MemoryRepository, MissingInstruments, RecordingStatus, SwitchControl,
};
