//! Historical poller.
//!
//! Every interval, for every symbol concurrently: fetch the most recent
//! window of historical samples, append the new ones to the cache window
//! and insert them into the store. Incremental mode only narrows the fetch
//! while the window is full. Store inserts are idempotent on
//! `(symbol, timestamp)`, so refetching an overlapping window is harmless.

use crate::fanout::fan_out;
use crate::report::{CycleReport, SymbolOutcome};
use oi_cache::WindowCache;
use oi_core::{HistoricalSample, Symbol};
use oi_persistence::HistoryStore;
use oi_telemetry::Metrics;
use oi_upstream::{HistoricalQuery, OpenInterestSource};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const LOOP_NAME: &str = "historical";

/// Historical poller settings.
#[derive(Debug, Clone)]
pub struct HistoricalSettings {
    pub interval: Duration,
    pub period: String,
    /// Samples requested per fetch (W).
    pub window_size: usize,
    /// Ask only for samples newer than the last stored timestamp.
    pub incremental: bool,
}

#[derive(Clone)]
pub struct HistoricalPoller {
    source: Arc<dyn OpenInterestSource>,
    cache: Arc<dyn WindowCache>,
    store: Arc<dyn HistoryStore>,
    symbols: Arc<[Symbol]>,
    settings: HistoricalSettings,
}

impl HistoricalPoller {
    pub fn new(
        source: Arc<dyn OpenInterestSource>,
        cache: Arc<dyn WindowCache>,
        store: Arc<dyn HistoryStore>,
        symbols: Vec<Symbol>,
        settings: HistoricalSettings,
    ) -> Self {
        Self {
            source,
            cache,
            store,
            symbols: symbols.into(),
            settings,
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            symbols = self.symbols.len(),
            interval_secs = self.settings.interval.as_secs(),
            incremental = self.settings.incremental,
            "Historical poller started"
        );

        loop {
            let report = self.run_cycle().await;
            Metrics::poll_cycle(LOOP_NAME);
            info!(%report, "Historical cycle complete");

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.changed() => {
                    info!("Historical poller stopping");
                    break;
                }
            }
        }
    }

    /// One fetch-and-store pass over every symbol.
    pub async fn run_cycle(&self) -> CycleReport {
        fan_out(LOOP_NAME, &self.symbols, |symbol| {
            let poller = self.clone();
            async move { poller.process_symbol(&symbol).await }
        })
        .await
    }

    async fn process_symbol(&self, symbol: &Symbol) -> SymbolOutcome {
        let mut failed = false;

        let window = match self.cache.read_window(symbol).await {
            Ok(window) => Some(window),
            Err(e) => {
                error!(%symbol, error = %e, "Failed to read window before fetch");
                failed = true;
                None
            }
        };
        let newest_cached = window
            .as_ref()
            .and_then(|w| w.last())
            .map(|s| s.timestamp);
        let window_full = window
            .as_ref()
            .is_some_and(|w| w.len() >= self.settings.window_size);

        // A short window (fresh start, cleared cache) always gets a full
        // refetch, even in incremental mode.
        let last_stored = if self.settings.incremental && window_full {
            self.last_stored(symbol).await
        } else {
            None
        };

        let mut query = HistoricalQuery::recent(
            self.settings.period.clone(),
            self.settings.window_size as u32,
        );
        if let Some(last) = last_stored {
            query = query.since(last + 1);
        }

        let mut samples = self.source.fetch_historical(symbol, &query).await;
        if let Some(last) = last_stored {
            samples.retain(|s| s.timestamp > last);
        }
        if samples.is_empty() {
            info!(%symbol, "No new historical open interest");
            return if failed {
                SymbolOutcome::Failed
            } else {
                SymbolOutcome::Empty
            };
        }
        samples.sort_by_key(|s| s.timestamp);

        if window.is_some() {
            let fresh: Vec<HistoricalSample> = samples
                .iter()
                .filter(|s| newest_cached.map_or(true, |newest| s.timestamp > newest))
                .cloned()
                .collect();
            if fresh.is_empty() {
                debug!(%symbol, "Window already holds every fetched sample");
            } else if let Err(e) = self.cache.push_history(symbol, &fresh).await {
                error!(%symbol, error = %e, "Failed to push samples into window");
                failed = true;
            }
        }

        let unstored = if self.settings.incremental && last_stored.is_none() {
            self.drop_stored(symbol, samples).await
        } else {
            samples
        };
        if unstored.is_empty() {
            debug!(%symbol, "Store already holds every fetched sample");
        } else {
            match self.store.save_history(symbol, &unstored).await {
                Ok(summary) => {
                    debug!(
                        %symbol,
                        inserted = summary.inserted,
                        duplicates = summary.duplicates,
                        failed = summary.failed,
                        "Stored historical samples"
                    );
                    failed |= summary.failed > 0;
                }
                Err(e) => {
                    error!(%symbol, error = %e, "Failed to store historical samples");
                    failed = true;
                }
            }
        }

        if failed {
            SymbolOutcome::Failed
        } else {
            SymbolOutcome::Ok
        }
    }

    async fn last_stored(&self, symbol: &Symbol) -> Option<i64> {
        match self.store.get_last_timestamp(symbol).await {
            Ok(last) => last,
            Err(e) => {
                warn!(%symbol, error = %e, "Last timestamp lookup failed, fetching full window");
                None
            }
        }
    }

    /// Drop samples whose timestamps are among the most recent stored ones.
    async fn drop_stored(
        &self,
        symbol: &Symbol,
        mut samples: Vec<HistoricalSample>,
    ) -> Vec<HistoricalSample> {
        match self
            .store
            .get_recent_timestamps(symbol, self.settings.window_size)
            .await
        {
            Ok(recent) => {
                let known: HashSet<i64> = recent.into_iter().collect();
                samples.retain(|s| !known.contains(&s.timestamp));
            }
            Err(e) => warn!(%symbol, error = %e, "Recent timestamps lookup failed"),
        }
        samples
    }
}
