//! Per-cycle outcome counters.
//!
//! A report lives for one loop iteration and is never shared between
//! tasks; each symbol task returns its outcome and the loop folds them.

use std::fmt;

/// What happened to one symbol in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// Work done, nothing to report.
    Ok,
    /// Upstream returned nothing usable.
    Empty,
    /// Deliberately not analyzed (window not filled).
    Skipped,
    /// A cache, store or task failure.
    Failed,
    /// Detector fired.
    Alerted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub ok: usize,
    pub empty: usize,
    pub skipped: usize,
    pub failed: usize,
    pub alerts: usize,
}

impl CycleReport {
    pub fn record(&mut self, outcome: SymbolOutcome) {
        match outcome {
            SymbolOutcome::Ok => self.ok += 1,
            SymbolOutcome::Empty => self.empty += 1,
            SymbolOutcome::Skipped => self.skipped += 1,
            SymbolOutcome::Failed => self.failed += 1,
            SymbolOutcome::Alerted => self.alerts += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.empty + self.skipped + self.failed + self.alerts
    }
}

impl FromIterator<SymbolOutcome> for CycleReport {
    fn from_iter<I: IntoIterator<Item = SymbolOutcome>>(iter: I) -> Self {
        let mut report = Self::default();
        for outcome in iter {
            report.record(outcome);
        }
        report
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok={} empty={} skipped={} failed={} alerts={}",
            self.ok, self.empty, self.skipped, self.failed, self.alerts
        )
    }
}
