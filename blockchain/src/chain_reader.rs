// Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Third party imports
use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

// Internal imports
use crate::rpc::{JsonRpcClient, RpcBlock};
use crate::tx_cache::TransactionCache;
use walletdash_common::storage::KeyValueStore;
use walletdash_common::utils::{current_timestamp_ms, same_address, wei_hex_to_ether};
use walletdash_common::{
    DashConfig, DashError, DashResult, Transaction, TransactionKind, TransactionStatus,
};

/// Nguồn dữ liệu chain cho view-state
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Giao dịch gần đây của địa chỉ, mới nhất trước
    async fn fetch_transactions(&self, address: &str) -> DashResult<Vec<Transaction>>;

    /// Số dư native (ether); lỗi được log và trả về 0
    async fn fetch_balance(&self, address: &str) -> f64;
}

/// Đọc block gần nhất qua JSON-RPC và giữ cache giao dịch theo địa chỉ
pub struct ChainReader {
    rpc: JsonRpcClient,
    cache: TransactionCache,
    freshness_window: Duration,
    block_window: u64,
}

impl ChainReader {
    pub fn new(
        rpc: JsonRpcClient,
        cache: TransactionCache,
        freshness_window: Duration,
        block_window: u64,
    ) -> Self {
        Self {
            rpc,
            cache,
            freshness_window,
            block_window: block_window.max(1),
        }
    }

    /// Tạo reader từ cấu hình. Thiếu project id là lỗi cấu hình nghiêm trọng.
    pub async fn from_config(config: &DashConfig, store: Arc<dyn KeyValueStore>) -> DashResult<Self> {
        let rpc = JsonRpcClient::from_config(config)?;
        let cache = TransactionCache::load(store).await;
        Ok(Self::new(rpc, cache, config.freshness_window(), config.block_window))
    }

    /// Tải các block trong cửa sổ (song song) và lọc giao dịch của địa chỉ
    async fn fetch_window(&self, address: &str) -> DashResult<Vec<Transaction>> {
        let latest = self.rpc.block_number().await?;
        let first = latest.saturating_sub(self.block_window - 1);
        debug!("Quét block {}..={} cho {}", first, latest, address);

        let blocks = try_join_all(
            (first..=latest).map(|number| self.rpc.get_block_with_transactions(number)),
        )
        .await?;

        let mut found = Vec::new();
        for block in blocks.iter().flatten() {
            found.extend(transactions_for_address(block, address)?);
        }
        Ok(found)
    }
}

#[async_trait]
impl ChainSource for ChainReader {
    async fn fetch_transactions(&self, address: &str) -> DashResult<Vec<Transaction>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(DashError::InvalidInput("address is empty".to_string()));
        }

        let _guard = self.cache.lock_address(address).await;
        let previous = self.cache.get(address).await;

        if let Some(entry) = &previous {
            if entry.is_fresh(current_timestamp_ms(), self.freshness_window) {
                debug!("Cache giao dịch của {} còn mới, bỏ qua RPC", address);
                return Ok(entry.sorted());
            }
        }

        match self.fetch_window(address).await {
            Ok(fresh) => {
                info!("Tìm thấy {} giao dịch mới cho {}", fresh.len(), address);
                Ok(self
                    .cache
                    .merge_and_persist(address, fresh, current_timestamp_ms())
                    .await)
            }
            Err(e) => match previous {
                Some(entry) => {
                    warn!("Không thể tải giao dịch cho {}, dùng cache: {}", address, e);
                    Ok(entry.sorted())
                }
                None => {
                    error!("Không thể tải giao dịch cho {}: {}", address, e);
                    if e.is_network() {
                        Err(e)
                    } else {
                        Err(DashError::Network(e.to_string()))
                    }
                }
            },
        }
    }

    async fn fetch_balance(&self, address: &str) -> f64 {
        let address = address.trim();
        if address.is_empty() {
            warn!("Bỏ qua truy vấn số dư cho địa chỉ rỗng");
            return 0.0;
        }

        let balance = match self.rpc.get_balance(address).await {
            Ok(hex) => wei_hex_to_ether(&hex),
            Err(e) => Err(e),
        };

        balance.unwrap_or_else(|e| {
            error!("Không thể lấy số dư của {}: {}", address, e);
            0.0
        })
    }
}

/// Chuyển các giao dịch trong block có gửi hoặc nhận từ `address`
pub fn transactions_for_address(block: &RpcBlock, address: &str) -> DashResult<Vec<Transaction>> {
    let timestamp = block.timestamp_ms()?;
    let block_number = block.number()?;

    let transactions = block
        .transactions
        .iter()
        .filter(|tx| {
            same_address(&tx.from, address)
                || tx.to.as_deref().map_or(false, |to| same_address(to, address))
        })
        .map(|tx| {
            let counterparty = if same_address(&tx.from, address) {
                tx.to.clone()
            } else {
                Some(tx.from.clone())
            };

            Transaction {
                id: tx.hash.clone(),
                kind: if tx.to.is_some() {
                    TransactionKind::Transfer
                } else {
                    TransactionKind::Contract
                },
                timestamp,
                status: TransactionStatus::Validated,
                block_number,
                counterparty_address: counterparty,
                creator_address: tx.from.clone(),
                endorsements: Vec::new(),
            }
        })
        .collect();

    Ok(transactions)
}
