//! Durable storage for open-interest history and the alert log.
//!
//! History rows are unique on `(symbol, timestamp)`, so re-fetching an
//! overlapping window is a no-op at this layer.

pub mod error;
pub mod memory;
pub mod mysql;
pub mod store;

pub use error::{PersistenceError, PersistenceResult};
pub use memory::MemoryStore;
pub use mysql::{MySqlStore, StoreSettings};
pub use store::{AlertLogEntry, HistoryStore, SaveSummary};
