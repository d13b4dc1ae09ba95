//! Startup: bounded connection retry and the pre-loop reset.

use crate::config::StartupConfig;
use crate::error::{AppError, AppResult};
use oi_cache::{Namespace, WindowCache};
use oi_persistence::HistoryStore;
use std::fmt::Display;
use std::future::Future;
use tracing::{error, info, warn};

/// Retry `op` up to `connect_attempts` times, `connect_delay` apart.
pub async fn with_retry<T, E, F, Fut>(what: &str, config: &StartupConfig, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = config.connect_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(what, attempt, "Connected after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(what, attempt, attempts, error = %e, "Not ready yet");
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(config.connect_delay()).await;
                }
            }
        }
    }

    error!(what, attempts, error = %last_error, "Giving up");
    Err(AppError::Startup(format!(
        "{what} unavailable after {attempts} attempts: {last_error}"
    )))
}

/// What the reset did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    /// False when the cache was unreachable and nothing was cleared.
    pub cache_cleared: bool,
    pub keys_removed: usize,
}

/// Clear stale cache namespaces, then provision the store schema.
///
/// The cache part is best-effort. Provisioning is retried with the startup
/// policy and is fatal if it never succeeds.
pub async fn reset(
    cache: &dyn WindowCache,
    store: &dyn HistoryStore,
    config: &StartupConfig,
) -> AppResult<ResetSummary> {
    let mut summary = ResetSummary::default();

    match cache.ping().await {
        Ok(()) => {
            summary.cache_cleared = true;
            for namespace in [Namespace::History, Namespace::Current] {
                match cache.clear_namespace(namespace).await {
                    Ok(removed) => summary.keys_removed += removed,
                    Err(e) => {
                        summary.cache_cleared = false;
                        warn!(prefix = namespace.prefix(), error = %e, "Failed to clear namespace");
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "Cache unavailable, skipping namespace clear"),
    }

    with_retry("schema", config, || store.provision_schema()).await?;

    info!(
        cache_cleared = summary.cache_cleared,
        keys_removed = summary.keys_removed,
        "Startup reset complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oi_cache::MemoryCache;
    use oi_core::{HistoricalSample, OpenInterest, Symbol};
    use oi_persistence::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast() -> StartupConfig {
        StartupConfig {
            connect_attempts: 3,
            connect_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let value = with_retry("thing", &fast(), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("not yet")
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let result: AppResult<()> =
            with_retry("thing", &fast(), || async { Err::<(), _>("down") }).await;
        assert!(matches!(result, Err(AppError::Startup(_))));
    }

    #[tokio::test]
    async fn test_reset_clears_and_provisions() {
        let cache = MemoryCache::new(30);
        let store = MemoryStore::new();
        let btc = Symbol::new("BTCUSDT").unwrap();
        cache
            .push_history(
                &btc,
                &[HistoricalSample::new(btc.clone(), 1, OpenInterest::ZERO, OpenInterest::ZERO)],
            )
            .await
            .unwrap();
        cache
            .set_threshold(&btc, OpenInterest::ZERO, Duration::from_secs(60))
            .await
            .unwrap();

        let summary = reset(&cache, &store, &fast()).await.unwrap();
        assert!(summary.cache_cleared);
        assert_eq!(summary.keys_removed, 1);
        assert!(cache.read_window(&btc).await.unwrap().is_empty());
        assert_eq!(store.provision_count(), 1);

        // Second start is just as clean.
        reset(&cache, &store, &fast()).await.unwrap();
        assert_eq!(store.provision_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_tolerates_cache_outage() {
        let cache = MemoryCache::new(30);
        cache.set_available(false);
        let store = MemoryStore::new();

        let summary = reset(&cache, &store, &fast()).await.unwrap();
        assert!(!summary.cache_cleared);
        assert_eq!(store.provision_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_fails_without_store() {
        let cache = MemoryCache::new(30);
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(reset(&cache, &store, &fast()).await.is_err());
    }
}
