//! Per-symbol fan-out for one poll cycle.

use crate::report::{CycleReport, SymbolOutcome};
use oi_core::Symbol;
use oi_telemetry::Metrics;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::error;

/// Run `task` for every symbol concurrently and fold the outcomes.
///
/// Each symbol runs in its own task, so a panic or failure in one never
/// cancels the others.
pub async fn fan_out<F, Fut>(loop_name: &'static str, symbols: &[Symbol], task: F) -> CycleReport
where
    F: Fn(Symbol) -> Fut,
    Fut: Future<Output = SymbolOutcome> + Send + 'static,
{
    let mut set = JoinSet::new();
    for symbol in symbols {
        let fut = task(symbol.clone());
        let symbol = symbol.clone();
        set.spawn(async move { (symbol, fut.await) });
    }

    let mut report = CycleReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((symbol, outcome)) => {
                if outcome == SymbolOutcome::Failed {
                    Metrics::symbol_failure(loop_name, symbol.as_str());
                }
                report.record(outcome);
            }
            Err(e) => {
                error!(loop_name, error = %e, "Symbol task aborted");
                report.record(SymbolOutcome::Failed);
            }
        }
    }
    report
}
