//! Open-interest surveillance service.
//!
//! Orchestrates:
//! - Startup reset (stale cache namespaces, schema provisioning)
//! - Historical poller (window + deduplicated history)
//! - Current poller (snapshot, deviation detection, alert log)

pub mod app;
pub mod config;
pub mod current;
pub mod error;
pub mod fanout;
pub mod historical;
pub mod metrics_server;
pub mod report;
pub mod startup;

pub use app::Application;
pub use config::AppConfig;
pub use current::{CurrentPoller, CurrentSettings};
pub use error::{AppError, AppResult};
pub use historical::{HistoricalPoller, HistoricalSettings};
pub use report::{CycleReport, SymbolOutcome};
