//! Main application orchestration.
//!
//! Startup order:
//! - connect cache and store (bounded retry)
//! - startup reset (clear stale windows and snapshots, provision schema)
//! - spawn the historical and current pollers
//!
//! Both pollers stop on Ctrl-C; the store pool is closed last.

use crate::config::AppConfig;
use crate::current::{CurrentPoller, CurrentSettings};
use crate::error::AppResult;
use crate::historical::{HistoricalPoller, HistoricalSettings};
use crate::metrics_server::serve_metrics;
use crate::startup::{reset, with_retry};
use futures_util::future::join_all;
use oi_cache::{RedisCache, RedisSettings, WindowCache};
use oi_core::Symbol;
use oi_detector::DeviationDetector;
use oi_persistence::{HistoryStore, MySqlStore, StoreSettings};
use oi_upstream::{ClientConfig, OpenInterestClient, OpenInterestSource};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Main application.
pub struct Application {
    config: AppConfig,
    symbols: Vec<Symbol>,
    source: Arc<dyn OpenInterestSource>,
    cache: Arc<dyn WindowCache>,
    store: Arc<dyn HistoryStore>,
}

impl Application {
    /// Build the production backends: REST client, Redis and MySQL.
    pub async fn connect(config: AppConfig) -> AppResult<Self> {
        let source = OpenInterestClient::new(ClientConfig::from(&config.upstream))?;

        let redis_settings = RedisSettings::from(&config.cache);
        let window_size = config.detector.window_size;
        let cache = with_retry("cache", &config.startup, || {
            RedisCache::connect(&redis_settings, window_size)
        })
        .await?;

        let store_settings = StoreSettings::from(&config.store);
        let store = with_retry("store", &config.startup, || {
            MySqlStore::connect(store_settings.clone())
        })
        .await?;

        Ok(Self::with_components(
            config,
            Arc::new(source),
            Arc::new(cache),
            Arc::new(store),
        ))
    }

    /// Assemble from already-built components.
    pub fn with_components(
        config: AppConfig,
        source: Arc<dyn OpenInterestSource>,
        cache: Arc<dyn WindowCache>,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        let symbols = config.symbols();
        Self {
            config,
            symbols,
            source,
            cache,
            store,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Run until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            symbols = ?self.symbols.iter().map(Symbol::as_str).collect::<Vec<_>>(),
            "Starting open-interest surveillance"
        );

        // Pollers must not start before this completes.
        reset(self.cache.as_ref(), self.store.as_ref(), &self.config.startup).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let historical = HistoricalPoller::new(
            self.source.clone(),
            self.cache.clone(),
            self.store.clone(),
            self.symbols.clone(),
            HistoricalSettings {
                interval: self.config.historical.interval(),
                period: self.config.upstream.period.clone(),
                window_size: self.config.detector.window_size,
                incremental: self.config.historical.incremental,
            },
        );

        let current = CurrentPoller::new(
            self.source.clone(),
            self.cache.clone(),
            self.store.clone(),
            DeviationDetector::new(self.config.detector.clone()),
            self.symbols.clone(),
            CurrentSettings {
                interval: self.config.current.interval(),
                window_retry_attempts: self.config.current.window_retry_attempts,
                window_retry_delay: self.config.current.window_retry_delay(),
            },
        );

        let historical_handle = tokio::spawn(historical.run(shutdown_rx.clone()));
        let current_handle = tokio::spawn(current.run(shutdown_rx.clone()));

        let metrics_handle = if self.config.telemetry.enabled {
            let port = self.config.telemetry.metrics_port;
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = serve_metrics(port, rx).await {
                    error!(port, error = %e, "Metrics server failed");
                }
            }))
        } else {
            None
        };

        shutdown.await;

        info!("Stopping pollers");
        shutdown_tx.send_replace(true);

        let results = join_all([historical_handle, current_handle]).await;
        for (name, result) in ["historical", "current"].into_iter().zip(results) {
            if let Err(e) = result {
                error!(poller = name, error = %e, "Poller task ended abnormally");
            }
        }
        if let Some(handle) = metrics_handle {
            let _ = handle.await;
        }

        self.store.close().await;
        info!("Shutdown complete");
        Ok(())
    }
}
