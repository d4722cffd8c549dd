//! Candle cadence supported by the upstream API.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Bar width of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// One-minute bars.
    #[default]
    Minute,
    /// One-hour bars.
    Hour,
}

impl Interval {
    /// Path segment used by the upstream endpoint (`minute` / `hour`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }

    /// Width of one bar in seconds.
    #[must_use]
    pub const fn step_seconds(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
        }
    }

    /// Round `ts` down to the start of its bar.
    #[must_use]
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.step_seconds();
        let secs = ts.timestamp().div_euclid(step) * step;
        Utc.timestamp_opt(secs, 0).single().unwrap_or(ts)
    }

    /// Whole bars elapsed from `from` to `to`, clamped at zero.
    #[must_use]
    pub fn units_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
        let secs = (to - from).num_seconds();
        if secs <= 0 {
            return 0;
        }
        u64::try_from(secs / self.step_seconds()).unwrap_or(0)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" | "1m" => Ok(Self::Minute),
            "hour" | "1h" => Ok(Self::Hour),
            other => Err(format!("unsupported interval '{other}'")),
        }
    }
}
