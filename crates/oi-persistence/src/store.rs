//! Store contract for historical samples and the alert log.

use crate::error::PersistenceResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oi_core::{HistoricalSample, Symbol};

/// One row of the append-only alert log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertLogEntry {
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

/// Outcome of a history batch insert.
///
/// Duplicates are the replay path, not failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl SaveSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }
}

/// Durable record of historical samples and fired alerts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Ensure database, tables and the unique `(symbol, timestamp)` index
    /// exist. Safe to call on every start.
    async fn provision_schema(&self) -> PersistenceResult<()>;

    /// Insert samples, ignoring `(symbol, timestamp)` duplicates.
    ///
    /// Per-row failures are logged and counted; the rest of the batch
    /// still goes in.
    async fn save_history(
        &self,
        symbol: &Symbol,
        samples: &[HistoricalSample],
    ) -> PersistenceResult<SaveSummary>;

    /// Append one alert message stamped with the write time.
    async fn save_log(&self, message: &str) -> PersistenceResult<()>;

    /// Newest stored timestamp for a symbol.
    async fn get_last_timestamp(&self, symbol: &Symbol) -> PersistenceResult<Option<i64>>;

    /// Up to `limit` stored timestamps for a symbol, newest first.
    async fn get_recent_timestamps(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> PersistenceResult<Vec<i64>>;

    /// Release connections.
    async fn close(&self) {}
}
