//! Detector configuration.

use crate::error::{DetectorError, DetectorResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for deviation detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples required before analysis (W).
    pub window_size: usize,
    /// Relative deviation from the window average that triggers (0.10 = 10%).
    pub deviation: Decimal,
    /// Guard multiplier after an upward alert.
    pub upper_guard_multiplier: Decimal,
    /// Guard multiplier after a downward alert.
    pub lower_guard_multiplier: Decimal,
    /// Guard lifetime after an upward alert.
    pub upper_ttl_secs: u64,
    /// Guard lifetime after a downward alert.
    pub lower_ttl_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            deviation: Decimal::new(10, 2),               // 10%
            upper_guard_multiplier: Decimal::new(101, 2), // 1.01
            lower_guard_multiplier: Decimal::new(99, 2),  // 0.99
            upper_ttl_secs: 300,
            lower_ttl_secs: 600,
        }
    }
}

impl DetectorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> DetectorResult<()> {
        if self.window_size == 0 {
            return Err(DetectorError::ConfigError(
                "window_size must be positive".to_string(),
            ));
        }

        if self.deviation <= Decimal::ZERO || self.deviation >= Decimal::ONE {
            return Err(DetectorError::ConfigError(format!(
                "deviation ({}) must be within (0, 1)",
                self.deviation
            )));
        }

        if self.upper_guard_multiplier < Decimal::ONE {
            return Err(DetectorError::ConfigError(format!(
                "upper_guard_multiplier ({}) must be >= 1",
                self.upper_guard_multiplier
            )));
        }

        if self.lower_guard_multiplier > Decimal::ONE || self.lower_guard_multiplier <= Decimal::ZERO
        {
            return Err(DetectorError::ConfigError(format!(
                "lower_guard_multiplier ({}) must be within (0, 1]",
                self.lower_guard_multiplier
            )));
        }

        if self.upper_ttl_secs == 0 || self.lower_ttl_secs == 0 {
            return Err(DetectorError::ConfigError(
                "guard TTLs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Upward trigger: current > avg * upper_trigger().
    pub fn upper_trigger(&self) -> Decimal {
        Decimal::ONE + self.deviation
    }

    /// Downward trigger: current < avg * lower_trigger().
    pub fn lower_trigger(&self) -> Decimal {
        Decimal::ONE - self.deviation
    }

    pub fn upper_ttl(&self) -> Duration {
        Duration::from_secs(self.upper_ttl_secs)
    }

    pub fn lower_ttl(&self) -> Duration {
        Duration::from_secs(self.lower_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upper_trigger(), dec!(1.10));
        assert_eq!(config.lower_trigger(), dec!(0.90));
        assert_eq!(config.upper_ttl(), Duration::from_secs(300));
        assert_eq!(config.lower_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = DetectorConfig {
            deviation: dec!(1.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            lower_guard_multiplier: dec!(1.01),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
