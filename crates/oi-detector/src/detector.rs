//! Deviation detector with a ratcheting guard.
//!
//! Strategy: compare the current open interest against the mean of the
//! sliding window.
//! - Up: current > avg * (1 + deviation), and above any live guard
//! - Down: current < avg * (1 - deviation), and below any live guard
//!
//! A fired alert leaves a guard slightly beyond the current value so the
//! same plateau does not re-alert until the guard expires.

use crate::config::DetectorConfig;
use oi_core::{AlertDirection, HistoricalSample, OpenInterest, Symbol, ThresholdState};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info};

/// A fired alert and the guard it leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub symbol: Symbol,
    pub direction: AlertDirection,
    pub current: OpenInterest,
    pub average: OpenInterest,
    /// Signed deviation from the average, in percent.
    pub deviation_pct: Decimal,
    /// Message for the log and the alert table.
    pub message: String,
    /// New guard value.
    pub guard: OpenInterest,
    pub guard_ttl: Duration,
}

/// Outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Window too short; nothing decided.
    InsufficientWindow { len: usize, required: usize },
    /// Window average is zero; deviation undefined.
    NoBaseline,
    /// Deviation crossed the trigger but the guard held it back.
    Suppressed {
        direction: AlertDirection,
        deviation_pct: Decimal,
        guard: OpenInterest,
    },
    /// Within the band.
    Quiet { deviation_pct: Decimal },
    Alert(Alert),
}

impl Decision {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Self::Alert(alert) => Some(alert),
            _ => None,
        }
    }

    /// Deviation in percent, when one was computed.
    pub fn deviation_pct(&self) -> Option<Decimal> {
        match self {
            Self::Alert(alert) => Some(alert.deviation_pct),
            Self::Suppressed { deviation_pct, .. } | Self::Quiet { deviation_pct } => {
                Some(*deviation_pct)
            }
            Self::InsufficientWindow { .. } | Self::NoBaseline => None,
        }
    }
}

/// Stateless deviation detector. Guard state lives in the cache.
#[derive(Debug, Clone)]
pub struct DeviationDetector {
    config: DetectorConfig,
}

impl DeviationDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Whether a window is long enough to analyze.
    pub fn is_ready(&self, window: &[HistoricalSample]) -> bool {
        window.len() >= self.config.window_size
    }

    /// Decide whether `current` deviates from the window average.
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        window: &[HistoricalSample],
        current: OpenInterest,
        guard: Option<&ThresholdState>,
    ) -> Decision {
        if !self.is_ready(window) {
            return Decision::InsufficientWindow {
                len: window.len(),
                required: self.config.window_size,
            };
        }

        let Some(average) = OpenInterest::mean(window.iter().map(|s| s.sum_open_interest)) else {
            return Decision::NoBaseline;
        };
        let Some(deviation_pct) = current.pct_from(average) else {
            return Decision::NoBaseline;
        };

        let guard_value = guard.map(|g| g.value);

        if current > average * self.config.upper_trigger() {
            if guard_value.map_or(true, |g| current > g) {
                return Decision::Alert(self.build_alert(
                    symbol,
                    AlertDirection::Up,
                    current,
                    average,
                    deviation_pct,
                ));
            }
            debug!(%symbol, %current, guard = ?guard_value, "Upward deviation held by guard");
            return Decision::Suppressed {
                direction: AlertDirection::Up,
                deviation_pct,
                guard: guard_value.unwrap_or(current),
            };
        }

        if current < average * self.config.lower_trigger() {
            if guard_value.map_or(true, |g| current < g) {
                return Decision::Alert(self.build_alert(
                    symbol,
                    AlertDirection::Down,
                    current,
                    average,
                    deviation_pct,
                ));
            }
            debug!(%symbol, %current, guard = ?guard_value, "Downward deviation held by guard");
            return Decision::Suppressed {
                direction: AlertDirection::Down,
                deviation_pct,
                guard: guard_value.unwrap_or(current),
            };
        }

        Decision::Quiet { deviation_pct }
    }

    fn build_alert(
        &self,
        symbol: &Symbol,
        direction: AlertDirection,
        current: OpenInterest,
        average: OpenInterest,
        deviation_pct: Decimal,
    ) -> Alert {
        let (multiplier, guard_ttl) = match direction {
            AlertDirection::Up => (self.config.upper_guard_multiplier, self.config.upper_ttl()),
            AlertDirection::Down => (self.config.lower_guard_multiplier, self.config.lower_ttl()),
        };
        let guard = current * multiplier;
        let message = format_message(symbol, direction, current, average, deviation_pct);

        info!(
            %symbol,
            %direction,
            current = %current,
            average = %average,
            deviation_pct = %deviation_pct.round_dp(2),
            guard = %guard,
            "Open interest deviation"
        );

        Alert {
            symbol: symbol.clone(),
            direction,
            current,
            average,
            deviation_pct,
            message,
            guard,
            guard_ttl,
        }
    }
}

/// `BTCUSDT OI up +15.00%: current 115.00, avg 100.00`
pub fn format_message(
    symbol: &Symbol,
    direction: AlertDirection,
    current: OpenInterest,
    average: OpenInterest,
    deviation_pct: Decimal,
) -> String {
    format!(
        "{symbol} OI {direction} {:+.2}%: current {}, avg {}",
        deviation_pct.round_dp(2),
        current.shortened(),
        average.shortened()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::new("BTCUSDT").unwrap()
    }

    fn flat_window(value: Decimal, len: usize) -> Vec<HistoricalSample> {
        (0..len)
            .map(|i| {
                HistoricalSample::new(
                    btc(),
                    i as i64 * 300_000,
                    OpenInterest::new(value),
                    OpenInterest::new(value * dec!(1000)),
                )
            })
            .collect()
    }

    fn oi(v: Decimal) -> OpenInterest {
        OpenInterest::new(v)
    }

    fn guard_from(alert: &Alert) -> ThresholdState {
        ThresholdState::new(alert.guard)
    }

    #[test]
    fn test_upward_hysteresis_sequence() {
        let detector = DeviationDetector::new(DetectorConfig::default());
        let window = flat_window(dec!(100), 30);

        let first = detector.evaluate(&btc(), &window, oi(dec!(115)), None);
        let alert = first.alert().expect("115 vs 100 should fire").clone();
        assert_eq!(alert.direction, AlertDirection::Up);
        assert_eq!(alert.guard.inner(), dec!(116.15));
        assert_eq!(alert.guard_ttl, Duration::from_secs(300));

        let guard = guard_from(&alert);
        let held = detector.evaluate(&btc(), &window, oi(dec!(116)), Some(&guard));
        assert!(matches!(
            held,
            Decision::Suppressed {
                direction: AlertDirection::Up,
                ..
            }
        ));

        let again = detector.evaluate(&btc(), &window, oi(dec!(117)), Some(&guard));
        let alert = again.alert().expect("117 is past the guard");
        assert_eq!(alert.guard.inner(), dec!(118.17));
    }

    #[test]
    fn test_downward_alert() {
        let detector = DeviationDetector::new(DetectorConfig::default());
        let window = flat_window(dec!(100), 30);

        let decision = detector.evaluate(&btc(), &window, oi(dec!(89)), None);
        let alert = decision.alert().expect("89 vs 100 should fire");
        assert_eq!(alert.direction, AlertDirection::Down);
        assert_eq!(alert.deviation_pct, dec!(-11));
        assert_eq!(alert.guard.inner(), dec!(88.11));
        assert_eq!(alert.guard_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_down_alert_after_up_guard() {
        // An upward guard is above the current value, so a drop clears it.
        let detector = DeviationDetector::new(DetectorConfig::default());
        let window = flat_window(dec!(100), 30);
        let guard = ThresholdState::new(oi(dec!(116.15)));

        let decision = detector.evaluate(&btc(), &window, oi(dec!(85)), Some(&guard));
        assert_eq!(decision.alert().unwrap().direction, AlertDirection::Down);
    }

    #[test]
    fn test_within_band_is_quiet() {
        let detector = DeviationDetector::new(DetectorConfig::default());
        let window = flat_window(dec!(100), 30);

        for current in [dec!(110), dec!(90), dec!(100)] {
            let decision = detector.evaluate(&btc(), &window, oi(current), None);
            assert!(matches!(decision, Decision::Quiet { .. }), "{current}");
        }
    }

    #[test]
    fn test_short_window_is_not_analyzed() {
        let detector = DeviationDetector::new(DetectorConfig::default());
        let window = flat_window(dec!(100), 29);

        let decision = detector.evaluate(&btc(), &window, oi(dec!(500)), None);
        assert_eq!(
            decision,
            Decision::InsufficientWindow {
                len: 29,
                required: 30
            }
        );
        assert!(decision.deviation_pct().is_none());
    }

    #[test]
    fn test_zero_average() {
        let detector = DeviationDetector::new(DetectorConfig::default());
        let window = flat_window(dec!(0), 30);
        assert_eq!(
            detector.evaluate(&btc(), &window, oi(dec!(1)), None),
            Decision::NoBaseline
        );
    }

    #[test]
    fn test_message_format() {
        let msg = format_message(
            &btc(),
            AlertDirection::Up,
            oi(dec!(1_150_000)),
            oi(dec!(1_000_000)),
            dec!(15),
        );
        assert_eq!(msg, "BTCUSDT OI up +15.00%: current 1.15M, avg 1.00M");
    }
}
