// Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Third party imports
use tokio::sync::RwLock;
use tracing::{info, warn};

// Internal imports
use walletdash_blockchain::ChainSource;
use walletdash_common::Transaction;

/// View-state danh sách giao dịch của địa chỉ đang hoạt động
pub struct TransactionStore {
    chain: Arc<dyn ChainSource>,
    transactions: RwLock<Vec<Transaction>>,
    generation: AtomicU64,
}

impl TransactionStore {
    pub fn new(chain: Arc<dyn ChainSource>) -> Self {
        Self {
            chain,
            transactions: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.transactions.read().await.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Xóa danh sách và trả về thế hệ mới
    pub async fn clear(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.transactions.write().await.clear();
        generation
    }

    /// Làm mới giao dịch qua chain reader.
    ///
    /// Lỗi không có cache để dự phòng cho ra danh sách rỗng.
    pub async fn refresh_transactions(&self, address: Option<&str>) -> Vec<Transaction> {
        self.refresh_transactions_for(self.generation(), address).await
    }

    /// Như `refresh_transactions`, kết quả chỉ được lưu khi vẫn ở thế hệ `generation`
    pub async fn refresh_transactions_for(&self, generation: u64, address: Option<&str>) -> Vec<Transaction> {
        let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
            warn!("Chưa có địa chỉ ví, bỏ qua việc tải giao dịch");
            self.transactions.write().await.clear();
            return Vec::new();
        };

        let transactions = match self.chain.fetch_transactions(address).await {
            Ok(transactions) => {
                info!("Đã tải {} giao dịch cho {}", transactions.len(), address);
                transactions
            }
            Err(e) => {
                warn!("Không thể tải giao dịch cho {}: {}", address, e);
                Vec::new()
            }
        };

        let mut current = self.transactions.write().await;
        if self.generation() == generation {
            *current = transactions.clone();
        }
        transactions
    }
}
