//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] oi_core::CoreError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] oi_upstream::UpstreamError),

    #[error("Cache error: {0}")]
    Cache(#[from] oi_cache::CacheError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] oi_persistence::PersistenceError),

    #[error("Detector error: {0}")]
    Detector(#[from] oi_detector::DetectorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] oi_telemetry::TelemetryError),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
