pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod storage;
pub mod utils;

// Re-exports
pub use config::{DashConfig, Holding, PriceSource, TrackedToken};
pub use error::{DashError, DashResult};
pub use models::{PriceQuote, TokenBalance, Transaction, TransactionKind, TransactionStatus};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
