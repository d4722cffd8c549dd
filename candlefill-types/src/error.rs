use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the candlefill workspace.
///
/// Configuration and input problems are fatal for a run; everything else is
/// scoped to the instrument being processed.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestError {
    /// Invalid or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required input file or column is missing.
    #[error("missing input: {what}")]
    MissingInput {
        /// Description of the missing input, e.g. "instrument list instruments.csv".
        what: String,
    },

    /// Reading or writing a durable file failed.
    #[error("io error on {path}: {msg}")]
    Io {
        /// Path of the file involved.
        path: String,
        /// Human-readable error message.
        msg: String,
    },

    /// Issues with stored or returned data that cannot be skipped row by row.
    #[error("data issue: {0}")]
    Data(String),
}

impl IngestError {
    /// Helper: build a `Config` error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Helper: build a `MissingInput` error.
    pub fn missing_input(what: impl Into<String>) -> Self {
        Self::MissingInput { what: what.into() }
    }

    /// Helper: build an `Io` error for a path.
    pub fn io(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            msg: err.to_string(),
        }
    }

    /// Helper: build a `Data` error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Returns true if this error must stop the process instead of skipping
    /// the current instrument.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingInput { .. })
    }
}

/// Outcome of a single failed request against the upstream candle API.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceError {
    /// The upstream asked the caller to slow down (HTTP 429).
    #[error("rate limited")]
    RateLimited,

    /// The request never produced an HTTP response (connect, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// A non-success, non-rate-limit status.
    #[error("rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// A success response whose body could not be decoded at all.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Helper: build a `Rejected` error.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Returns true for failures expected to clear on their own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transport(_))
    }
}
