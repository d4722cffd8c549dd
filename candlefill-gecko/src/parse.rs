use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use candlefill_core::{Candle, Page, SourceError};

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Data>,
}

#[derive(Debug, Default, Deserialize)]
struct Data {
    #[serde(default)]
    attributes: Option<Attributes>,
}

#[derive(Debug, Default, Deserialize)]
struct Attributes {
    #[serde(default)]
    ohlcv_list: Vec<Value>,
}

/// Decode an OHLCV response body into candles for `instrument_id`.
///
/// A body without `data.attributes.ohlcv_list` decodes to zero rows. Rows
/// that are not `[ts, open, high, low, close, volume]` with numeric (or
/// numeric string) cells are dropped but still counted in
/// [`Page::returned`].
///
/// # Errors
/// Returns `SourceError::Malformed` when the body is not a JSON object.
pub fn parse_ohlcv(instrument_id: &str, body: &str) -> Result<Page, SourceError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;
    let rows = envelope
        .data
        .and_then(|d| d.attributes)
        .map(|a| a.ohlcv_list)
        .unwrap_or_default();

    let total = rows.len();
    let candles: Vec<Candle> = rows
        .iter()
        .filter_map(|row| parse_row(instrument_id, row))
        .collect();
    if candles.len() < total {
        tracing::debug!(
            instrument = instrument_id,
            dropped = total - candles.len(),
            "dropped malformed ohlcv rows"
        );
    }
    Ok(Page::with_returned(candles, total))
}

fn parse_row(instrument_id: &str, row: &Value) -> Option<Candle> {
    let cells = row.as_array()?;
    if cells.len() < 6 {
        return None;
    }
    Some(Candle {
        instrument_id: instrument_id.to_string(),
        ts: timestamp(&cells[0])?,
        open: decimal(&cells[1])?,
        high: decimal(&cells[2])?,
        low: decimal(&cells[3])?,
        close: decimal(&cells[4])?,
        volume: decimal(&cells[5])?,
    })
}

fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    let secs = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

fn decimal(v: &Value) -> Option<Decimal> {
    let text = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
