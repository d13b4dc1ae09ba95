//! Shared fixtures for the pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use oi_core::{CurrentSnapshot, HistoricalSample, OpenInterest, Symbol};
use oi_upstream::{HistoricalQuery, OpenInterestSource};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn symbol(raw: &str) -> Symbol {
    Symbol::new(raw).unwrap()
}

pub fn flat_history(symbol: &Symbol, value: Decimal, len: usize) -> Vec<HistoricalSample> {
    (0..len)
        .map(|i| {
            HistoricalSample::new(
                symbol.clone(),
                1_700_000_000_000 + i as i64 * 300_000,
                OpenInterest::new(value),
                OpenInterest::new(value * Decimal::from(1000)),
            )
        })
        .collect()
}

/// Upstream fake with per-symbol scripted responses.
///
/// `current` values are consumed one per call; `None` entries simulate a
/// call that failed on every attempt. An exhausted script also yields `None`.
#[derive(Default)]
pub struct ScriptedSource {
    history: Mutex<HashMap<Symbol, Vec<HistoricalSample>>>,
    current: Mutex<HashMap<Symbol, VecDeque<Option<Decimal>>>>,
    pub historical_calls: AtomicUsize,
    pub current_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_history(&self, symbol: &Symbol, samples: Vec<HistoricalSample>) {
        self.history.lock().insert(symbol.clone(), samples);
    }

    pub fn push_current(&self, symbol: &Symbol, values: impl IntoIterator<Item = Option<Decimal>>) {
        self.current
            .lock()
            .entry(symbol.clone())
            .or_default()
            .extend(values);
    }

    pub fn historical_calls(&self) -> usize {
        self.historical_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OpenInterestSource for ScriptedSource {
    async fn fetch_historical(
        &self,
        symbol: &Symbol,
        query: &HistoricalQuery,
    ) -> Vec<HistoricalSample> {
        self.historical_calls.fetch_add(1, Ordering::SeqCst);
        let history = self.history.lock();
        let Some(samples) = history.get(symbol) else {
            return Vec::new();
        };
        let start = samples.len().saturating_sub(query.limit as usize);
        samples[start..]
            .iter()
            .filter(|s| query.start_time.map_or(true, |t| s.timestamp >= t))
            .cloned()
            .collect()
    }

    async fn fetch_current(&self, symbol: &Symbol) -> Option<CurrentSnapshot> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let value = self
            .current
            .lock()
            .get_mut(symbol)
            .and_then(|queue| queue.pop_front())
            .flatten()?;
        Some(CurrentSnapshot::new(
            symbol.clone(),
            OpenInterest::new(value),
            Utc::now(),
        ))
    }
}
