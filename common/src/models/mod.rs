pub mod token;
pub mod transaction;

pub use token::{PriceQuote, TokenBalance};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
