//! In-process store with the same duplicate semantics as the MySQL table.

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{AlertLogEntry, HistoryStore, SaveSummary};
use async_trait::async_trait;
use chrono::Utc;
use oi_core::{HistoricalSample, Symbol};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Store keyed by `(symbol, timestamp)`.
#[derive(Default)]
pub struct MemoryStore {
    history: Mutex<BTreeMap<(Symbol, i64), HistoricalSample>>,
    log: Mutex<Vec<AlertLogEntry>>,
    provisioned: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Stored samples for a symbol, oldest first.
    pub fn history(&self, symbol: &Symbol) -> Vec<HistoricalSample> {
        self.history
            .lock()
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .map(|(_, sample)| sample.clone())
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Alert log, in write order.
    pub fn log_entries(&self) -> Vec<AlertLogEntry> {
        self.log.lock().clone()
    }

    /// Number of `provision_schema` calls that went through.
    pub fn provision_count(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    fn check(&self) -> PersistenceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PersistenceError::Unavailable(
                "memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn provision_schema(&self) -> PersistenceResult<()> {
        self.check()?;
        self.provisioned.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_history(
        &self,
        symbol: &Symbol,
        samples: &[HistoricalSample],
    ) -> PersistenceResult<SaveSummary> {
        self.check()?;
        let mut summary = SaveSummary::default();
        let mut history = self.history.lock();
        for sample in samples {
            let key = (symbol.clone(), sample.timestamp);
            if history.contains_key(&key) {
                summary.duplicates += 1;
            } else {
                history.insert(key, sample.clone());
                summary.inserted += 1;
            }
        }
        Ok(summary)
    }

    async fn save_log(&self, message: &str) -> PersistenceResult<()> {
        self.check()?;
        self.log.lock().push(AlertLogEntry {
            message: message.to_string(),
            logged_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_last_timestamp(&self, symbol: &Symbol) -> PersistenceResult<Option<i64>> {
        self.check()?;
        Ok(self
            .history
            .lock()
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, ts)| *ts)
            .max())
    }

    async fn get_recent_timestamps(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> PersistenceResult<Vec<i64>> {
        self.check()?;
        Ok(self
            .history
            .lock()
            .keys()
            .rev()
            .filter(|(s, _)| s == symbol)
            .map(|(_, ts)| *ts)
            .take(limit)
            .collect())
    }
}
