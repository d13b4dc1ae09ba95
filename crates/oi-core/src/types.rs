//! Open-interest domain records.
//!
//! `HistoricalSample` and `CurrentSnapshot` are what the pollers move between
//! the exchange, the cache and the relational store. `ThresholdState` is the
//! hysteresis guard left behind by the last fired alert.

use crate::{OpenInterest, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One bucket of historical open interest.
///
/// Immutable once produced; uniquely identified by `(symbol, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalSample {
    pub symbol: Symbol,
    /// Bucket timestamp in milliseconds since epoch.
    pub timestamp: i64,
    /// Total open interest (contracts).
    pub sum_open_interest: OpenInterest,
    /// Total open interest value (quote notional).
    pub sum_open_interest_value: OpenInterest,
}

impl HistoricalSample {
    pub fn new(
        symbol: Symbol,
        timestamp: i64,
        sum_open_interest: OpenInterest,
        sum_open_interest_value: OpenInterest,
    ) -> Self {
        Self {
            symbol,
            timestamp,
            sum_open_interest,
            sum_open_interest_value,
        }
    }
}

/// Latest open-interest reading for a symbol. Latest wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub symbol: Symbol,
    pub open_interest: OpenInterest,
    pub observed_at: DateTime<Utc>,
}

impl CurrentSnapshot {
    pub fn new(symbol: Symbol, open_interest: OpenInterest, observed_at: DateTime<Utc>) -> Self {
        Self {
            symbol,
            open_interest,
            observed_at,
        }
    }
}

/// Direction of a deviation from the window average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    /// Current value above the average.
    Up,
    /// Current value below the average.
    Down,
}

impl AlertDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hysteresis guard for a symbol.
///
/// While present, a repeat alert must move past `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdState {
    pub value: OpenInterest,
    /// Remaining lifetime, when the backend reports one.
    pub expires_in: Option<Duration>,
}

impl ThresholdState {
    pub fn new(value: OpenInterest) -> Self {
        Self {
            value,
            expires_in: None,
        }
    }
}
