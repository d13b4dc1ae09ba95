//! Exchange client for open-interest data.
//!
//! Fetches historical and current open interest over REST, maps the wire
//! records to domain types, and owns the retry/backoff policy.

pub mod client;
pub mod error;
pub mod wire;

pub use client::{ClientConfig, HistoricalQuery, OpenInterestClient, OpenInterestSource};
pub use error::{UpstreamError, UpstreamResult};
pub use wire::{parse_current, parse_historical, DecimalText, RawCurrentEntry, RawHistoricalEntry};
