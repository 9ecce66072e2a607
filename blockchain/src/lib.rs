//! Tầng đồng bộ dữ liệu: JSON-RPC node, cache giao dịch và price feed.

pub mod chain_reader;
pub mod price_feed;
pub mod rpc;
pub mod tx_cache;

// Re-export các module chính
pub use chain_reader::{ChainReader, ChainSource};
pub use price_feed::{create_price_provider, FeedPriceClient, PriceProvider, StaticPriceProvider};
pub use rpc::{JsonRpcClient, RpcBlock, RpcTransaction};
pub use tx_cache::{merge_entries, CacheEntry, TransactionCache};
