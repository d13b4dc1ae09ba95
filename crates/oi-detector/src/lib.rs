//! Open-interest deviation detection.
//!
//! Compares the current open interest with the sliding-window average and
//! applies a ratcheting guard so a plateaued value does not re-alert.

pub mod config;
pub mod detector;
pub mod error;

pub use config::DetectorConfig;
pub use detector::{format_message, Alert, Decision, DeviationDetector};
pub use error::{DetectorError, DetectorResult};
