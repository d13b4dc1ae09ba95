//! Core domain types for the open-interest surveillance pipeline.
//!
//! This crate provides the types shared by every other crate:
//! - `Symbol`: normalized exchange symbol
//! - `OpenInterest`: precision-safe open-interest amount
//! - `HistoricalSample`, `CurrentSnapshot`: records moved by the pollers
//! - `ThresholdState`, `AlertDirection`: hysteresis guard state

pub mod decimal;
pub mod error;
pub mod symbol;
pub mod types;

pub use decimal::OpenInterest;
pub use error::{CoreError, Result};
pub use symbol::Symbol;
pub use types::{AlertDirection, CurrentSnapshot, HistoricalSample, ThresholdState};
