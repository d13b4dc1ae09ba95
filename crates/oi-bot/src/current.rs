//! Current poller and detector.
//!
//! Every interval, for every symbol concurrently:
//! 1. fetch the current open interest and cache it
//! 2. read the window, waiting briefly for the historical poller if short
//! 3. compare against the window average with the cached guard
//! 4. on an alert, append to the alert log, then ratchet the guard

use crate::fanout::fan_out;
use crate::report::{CycleReport, SymbolOutcome};
use oi_cache::WindowCache;
use oi_core::{HistoricalSample, Symbol};
use oi_detector::{Decision, DeviationDetector};
use oi_persistence::HistoryStore;
use oi_telemetry::Metrics;
use oi_upstream::OpenInterestSource;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const LOOP_NAME: &str = "current";

/// Current poller settings.
#[derive(Debug, Clone)]
pub struct CurrentSettings {
    pub interval: Duration,
    /// Extra window reads when the window is short.
    pub window_retry_attempts: u32,
    pub window_retry_delay: Duration,
}

#[derive(Clone)]
pub struct CurrentPoller {
    source: Arc<dyn OpenInterestSource>,
    cache: Arc<dyn WindowCache>,
    store: Arc<dyn HistoryStore>,
    detector: Arc<DeviationDetector>,
    symbols: Arc<[Symbol]>,
    settings: CurrentSettings,
}

/// Result of waiting for a full window.
enum WindowRead {
    Ready(Vec<HistoricalSample>),
    Short(usize),
}

impl CurrentPoller {
    pub fn new(
        source: Arc<dyn OpenInterestSource>,
        cache: Arc<dyn WindowCache>,
        store: Arc<dyn HistoryStore>,
        detector: DeviationDetector,
        symbols: Vec<Symbol>,
        settings: CurrentSettings,
    ) -> Self {
        Self {
            source,
            cache,
            store,
            detector: Arc::new(detector),
            symbols: symbols.into(),
            settings,
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            symbols = self.symbols.len(),
            interval_secs = self.settings.interval.as_secs(),
            window_size = self.detector.config().window_size,
            "Current poller started"
        );

        loop {
            let report = self.run_cycle().await;
            Metrics::poll_cycle(LOOP_NAME);
            info!(%report, "Current cycle complete");

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = shutdown.changed() => {
                    info!("Current poller stopping");
                    break;
                }
            }
        }
    }

    /// One fetch-and-analyze pass over every symbol.
    pub async fn run_cycle(&self) -> CycleReport {
        fan_out(LOOP_NAME, &self.symbols, |symbol| {
            let poller = self.clone();
            async move { poller.process_symbol(&symbol).await }
        })
        .await
    }

    async fn process_symbol(&self, symbol: &Symbol) -> SymbolOutcome {
        let Some(snapshot) = self.source.fetch_current(symbol).await else {
            debug!(%symbol, "No current open interest this cycle");
            return SymbolOutcome::Empty;
        };

        if let Err(e) = self.cache.set_current(&snapshot).await {
            warn!(%symbol, error = %e, "Failed to cache current snapshot");
        }

        let window = match self.read_full_window(symbol).await {
            Ok(WindowRead::Ready(window)) => window,
            Ok(WindowRead::Short(len)) => {
                info!(
                    %symbol,
                    len,
                    required = self.detector.config().window_size,
                    "Insufficient window, skipping analysis"
                );
                Metrics::insufficient_window(symbol.as_str());
                return SymbolOutcome::Skipped;
            }
            Err(e) => {
                error!(%symbol, error = %e, "Failed to read window");
                return SymbolOutcome::Failed;
            }
        };
        Metrics::window_length(symbol.as_str(), window.len());

        let guard = match self.cache.get_threshold(symbol).await {
            Ok(guard) => guard,
            Err(e) => {
                error!(%symbol, error = %e, "Failed to read guard, skipping analysis");
                return SymbolOutcome::Failed;
            }
        };

        let decision =
            self.detector
                .evaluate(symbol, &window, snapshot.open_interest, guard.as_ref());

        if let Some(pct) = decision.deviation_pct().and_then(|d| d.to_f64()) {
            Metrics::deviation_pct(symbol.as_str(), pct);
        }

        match decision {
            Decision::Alert(alert) => {
                info!(%symbol, message = %alert.message, "Open interest alert");
                Metrics::alert_fired(symbol.as_str(), alert.direction.as_str());

                // No guard without a logged alert, so the next cycle retries.
                if let Err(e) = self.store.save_log(&alert.message).await {
                    error!(%symbol, error = %e, "Failed to append alert log, guard not set");
                    return SymbolOutcome::Failed;
                }
                if let Err(e) = self
                    .cache
                    .set_threshold(symbol, alert.guard, alert.guard_ttl)
                    .await
                {
                    error!(%symbol, error = %e, "Failed to set guard");
                }
                SymbolOutcome::Alerted
            }
            Decision::Suppressed {
                direction, guard, ..
            } => {
                debug!(%symbol, %direction, %guard, "Deviation held by guard");
                SymbolOutcome::Ok
            }
            Decision::NoBaseline => {
                warn!(%symbol, "Window average is zero, skipping analysis");
                SymbolOutcome::Skipped
            }
            Decision::InsufficientWindow { .. } => SymbolOutcome::Skipped,
            Decision::Quiet { .. } => SymbolOutcome::Ok,
        }
    }

    /// Read the window, retrying while it is shorter than required.
    async fn read_full_window(&self, symbol: &Symbol) -> oi_cache::CacheResult<WindowRead> {
        let attempts = self.settings.window_retry_attempts;
        let mut attempt = 0u32;

        loop {
            let window = self.cache.read_window(symbol).await?;
            if self.detector.is_ready(&window) {
                return Ok(WindowRead::Ready(window));
            }
            if attempt >= attempts {
                return Ok(WindowRead::Short(window.len()));
            }

            attempt += 1;
            debug!(
                %symbol,
                len = window.len(),
                attempt,
                attempts,
                "Window not full yet, waiting"
            );
            tokio::time::sleep(self.settings.window_retry_delay).await;
        }
    }
}
