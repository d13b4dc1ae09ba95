//! In-process window cache.
//!
//! Same contract as the Redis cache. Used by tests and local dry runs.

use crate::cache::WindowCache;
use crate::error::{CacheError, CacheResult};
use crate::keys::Namespace;
use async_trait::async_trait;
use dashmap::DashMap;
use oi_core::{CurrentSnapshot, HistoricalSample, OpenInterest, Symbol, ThresholdState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Guard {
    value: OpenInterest,
    expires_at: Instant,
}

/// DashMap-backed cache.
pub struct MemoryCache {
    window_size: usize,
    windows: DashMap<Symbol, VecDeque<HistoricalSample>>,
    current: DashMap<Symbol, CurrentSnapshot>,
    thresholds: DashMap<Symbol, Guard>,
    available: AtomicBool,
}

impl MemoryCache {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: DashMap::new(),
            current: DashMap::new(),
            thresholds: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Seed a guard directly, bypassing availability.
    pub fn insert_threshold(&self, symbol: &Symbol, value: OpenInterest, ttl: Duration) {
        self.thresholds.insert(
            symbol.clone(),
            Guard {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Raw guard lookup, bypassing availability.
    pub fn peek_threshold(&self, symbol: &Symbol) -> Option<ThresholdState> {
        self.live_threshold(symbol)
    }

    fn check(&self) -> CacheResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("memory cache marked unavailable".to_string()))
        }
    }

    fn live_threshold(&self, symbol: &Symbol) -> Option<ThresholdState> {
        let now = Instant::now();
        let guard = *self.thresholds.get(symbol)?;
        if guard.expires_at <= now {
            self.thresholds
                .remove_if(symbol, |_, g| g.expires_at <= now);
            return None;
        }
        Some(ThresholdState {
            value: guard.value,
            expires_in: Some(guard.expires_at - now),
        })
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(crate::cache::DEFAULT_WINDOW_SIZE)
    }
}

#[async_trait]
impl WindowCache for MemoryCache {
    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }

    fn window_size(&self) -> usize {
        self.window_size
    }

    async fn push_history(
        &self,
        symbol: &Symbol,
        samples: &[HistoricalSample],
    ) -> CacheResult<()> {
        self.check()?;
        if samples.is_empty() {
            return Ok(());
        }

        // The entry guard holds the shard lock across push and trim.
        let mut window = self.windows.entry(symbol.clone()).or_default();
        window.extend(samples.iter().cloned());
        while window.len() > self.window_size {
            window.pop_front();
        }
        Ok(())
    }

    async fn read_window(&self, symbol: &Symbol) -> CacheResult<Vec<HistoricalSample>> {
        self.check()?;
        Ok(self
            .windows
            .get(symbol)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_current(&self, snapshot: &CurrentSnapshot) -> CacheResult<()> {
        self.check()?;
        self.current
            .insert(snapshot.symbol.clone(), snapshot.clone());
        Ok(())
    }

    async fn get_current(&self, symbol: &Symbol) -> CacheResult<Option<CurrentSnapshot>> {
        self.check()?;
        Ok(self.current.get(symbol).map(|s| s.clone()))
    }

    async fn get_threshold(&self, symbol: &Symbol) -> CacheResult<Option<ThresholdState>> {
        self.check()?;
        Ok(self.live_threshold(symbol))
    }

    async fn set_threshold(
        &self,
        symbol: &Symbol,
        value: OpenInterest,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.check()?;
        self.insert_threshold(symbol, value, ttl);
        Ok(())
    }

    async fn clear_namespace(&self, namespace: Namespace) -> CacheResult<usize> {
        self.check()?;
        let removed = match namespace {
            Namespace::History => {
                let n = self.windows.len();
                self.windows.clear();
                n
            }
            Namespace::Current => {
                let n = self.current.len();
                self.current.clear();
                n
            }
            Namespace::Threshold => {
                let n = self.thresholds.len();
                self.thresholds.clear();
                n
            }
        };
        Ok(removed)
    }
}
