//! Cache key schema.
//!
//! | Namespace               | Value                                    |
//! |-------------------------|------------------------------------------|
//! | `open_interest:{S}`     | list of JSON `HistoricalSample`, <= W    |
//! | `open_interest_current:{S}` | JSON `CurrentSnapshot`               |
//! | `last_threshold:{S}`    | decimal text with a TTL                  |

use oi_core::Symbol;

/// Key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Sliding window of historical samples.
    History,
    /// Latest snapshot.
    Current,
    /// Hysteresis guard.
    Threshold,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::History => "open_interest",
            Self::Current => "open_interest_current",
            Self::Threshold => "last_threshold",
        }
    }

    /// Key for a symbol in this namespace.
    pub fn key(&self, symbol: &Symbol) -> String {
        format!("{}:{}", self.prefix(), symbol)
    }

    /// Glob matching every key in this namespace.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.prefix())
    }
}
