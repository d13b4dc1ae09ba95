//! Cache contract shared by the pollers.

use crate::error::CacheResult;
use crate::keys::Namespace;
use async_trait::async_trait;
use oi_core::{CurrentSnapshot, HistoricalSample, OpenInterest, Symbol, ThresholdState};
use std::time::Duration;

/// Default sliding-window length.
pub const DEFAULT_WINDOW_SIZE: usize = 30;

/// Low-latency store for the sliding windows, latest snapshots and
/// hysteresis guards.
///
/// The Historical Poller is the only writer of windows; the Current Poller
/// only reads them.
#[async_trait]
pub trait WindowCache: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> CacheResult<()>;

    /// Maximum window length kept per symbol.
    fn window_size(&self) -> usize;

    /// Append samples in order, then keep only the last `window_size()`.
    ///
    /// Readers never observe the appended-but-untrimmed state.
    async fn push_history(&self, symbol: &Symbol, samples: &[HistoricalSample])
        -> CacheResult<()>;

    /// Window contents, oldest first. Empty when absent.
    async fn read_window(&self, symbol: &Symbol) -> CacheResult<Vec<HistoricalSample>>;

    /// Overwrite the latest snapshot.
    async fn set_current(&self, snapshot: &CurrentSnapshot) -> CacheResult<()>;

    /// Latest snapshot, if any.
    async fn get_current(&self, symbol: &Symbol) -> CacheResult<Option<CurrentSnapshot>>;

    /// Hysteresis guard, if present and unexpired.
    async fn get_threshold(&self, symbol: &Symbol) -> CacheResult<Option<ThresholdState>>;

    /// Set the hysteresis guard with a time-to-live.
    async fn set_threshold(
        &self,
        symbol: &Symbol,
        value: OpenInterest,
        ttl: Duration,
    ) -> CacheResult<()>;

    /// Drop every key in a namespace. Returns the number of keys removed.
    async fn clear_namespace(&self, namespace: Namespace) -> CacheResult<usize>;
}
