//! Exchange wire records and their mapping to domain types.
//!
//! Responses are decoded into loosely-typed records first so that one
//! malformed entry fails on its own with `UpstreamError::Parse` instead of
//! taking the whole batch with it.

use crate::error::{UpstreamError, UpstreamResult};
use chrono::{DateTime, TimeZone, Utc};
use oi_core::{CurrentSnapshot, HistoricalSample, OpenInterest, Symbol};
use serde::Deserialize;

/// Decimal value as sent by the exchange: usually text, occasionally a bare number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DecimalText {
    Text(String),
    Number(serde_json::Number),
}

impl DecimalText {
    fn parse(&self, field: &str) -> UpstreamResult<OpenInterest> {
        let text = match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        };
        text.parse()
            .map_err(|e| UpstreamError::Parse(format!("field {field}={text:?}: {e}")))
    }
}

/// Entry of the historical open-interest endpoint.
///
/// Format: `{"symbol":"BTCUSDT","sumOpenInterest":"20403.6","sumOpenInterestValue":"150570784.07","timestamp":1583127900000}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawHistoricalEntry {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(rename = "sumOpenInterest", default)]
    pub sum_open_interest: Option<DecimalText>,
    #[serde(rename = "sumOpenInterestValue", default)]
    pub sum_open_interest_value: Option<DecimalText>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Body of the current open-interest endpoint.
///
/// Format: `{"openInterest":"10659.509","symbol":"BTCUSDT","time":1589437530011}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawCurrentEntry {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(rename = "openInterest", default)]
    pub open_interest: Option<DecimalText>,
    #[serde(default)]
    pub time: Option<i64>,
}

impl RawHistoricalEntry {
    /// Map to a `HistoricalSample` for the requested symbol.
    ///
    /// The requested symbol wins over the echoed one; a mismatch is rejected.
    pub fn into_sample(self, requested: &Symbol) -> UpstreamResult<HistoricalSample> {
        check_symbol(self.symbol.as_deref(), requested)?;

        let timestamp = self
            .timestamp
            .ok_or_else(|| UpstreamError::Parse("missing field timestamp".to_string()))?;
        let sum_open_interest = required(self.sum_open_interest, "sumOpenInterest")?;
        let sum_open_interest_value =
            required(self.sum_open_interest_value, "sumOpenInterestValue")?;

        Ok(HistoricalSample::new(
            requested.clone(),
            timestamp,
            sum_open_interest,
            sum_open_interest_value,
        ))
    }
}

impl RawCurrentEntry {
    /// Map to a `CurrentSnapshot`. Falls back to `now` when `time` is absent.
    pub fn into_snapshot(
        self,
        requested: &Symbol,
        now: DateTime<Utc>,
    ) -> UpstreamResult<CurrentSnapshot> {
        check_symbol(self.symbol.as_deref(), requested)?;

        let open_interest = required(self.open_interest, "openInterest")?;
        let observed_at = self
            .time
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(now);

        Ok(CurrentSnapshot::new(
            requested.clone(),
            open_interest,
            observed_at,
        ))
    }
}

fn required(value: Option<DecimalText>, field: &str) -> UpstreamResult<OpenInterest> {
    value
        .ok_or_else(|| UpstreamError::Parse(format!("missing field {field}")))?
        .parse(field)
}

fn check_symbol(echoed: Option<&str>, requested: &Symbol) -> UpstreamResult<()> {
    match echoed {
        Some(s) if !s.eq_ignore_ascii_case(requested.as_str()) => Err(UpstreamError::Parse(
            format!("symbol mismatch: requested {requested}, got {s}"),
        )),
        _ => Ok(()),
    }
}

/// Decode a historical response body.
///
/// Entries that fail to decode or map are returned as errors next to the
/// good ones; the caller decides how to report them.
pub fn parse_historical(
    body: &str,
    symbol: &Symbol,
) -> UpstreamResult<Vec<UpstreamResult<HistoricalSample>>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value::<RawHistoricalEntry>(entry)
                .map_err(UpstreamError::from)
                .and_then(|raw| raw.into_sample(symbol))
        })
        .collect())
}

/// Decode a current open-interest response body.
pub fn parse_current(
    body: &str,
    symbol: &Symbol,
    now: DateTime<Utc>,
) -> UpstreamResult<CurrentSnapshot> {
    let raw: RawCurrentEntry = serde_json::from_str(body)?;
    raw.into_snapshot(symbol, now)
}
