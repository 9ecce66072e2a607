// Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Third party imports
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

// Internal imports
use walletdash_common::storage::{self, KeyValueStore, TRANSACTIONS_KEY};
use walletdash_common::utils::normalize_address;
use walletdash_common::Transaction;

/// Cache giao dịch của một địa chỉ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Giao dịch theo id
    pub transactions: HashMap<String, Transaction>,
    /// Thời điểm lấy dữ liệu thành công gần nhất (ms epoch)
    pub last_fetched_at_ms: i64,
}

impl CacheEntry {
    /// Danh sách giao dịch, mới nhất trước
    pub fn sorted(&self) -> Vec<Transaction> {
        let mut list: Vec<Transaction> = self.transactions.values().cloned().collect();
        list.sort_by(Transaction::newest_first);
        list
    }

    /// Entry còn trong cửa sổ tươi hay không
    pub fn is_fresh(&self, now_ms: i64, window: Duration) -> bool {
        let age = now_ms - self.last_fetched_at_ms;
        age >= 0 && (age as u128) < window.as_millis()
    }
}

/// Hợp nhất giao dịch mới vào entry cũ theo id.
///
/// Giao dịch cũ không xuất hiện trong cửa sổ mới vẫn được giữ lại.
pub fn merge_entries(previous: Option<&CacheEntry>, fresh: Vec<Transaction>, now_ms: i64) -> CacheEntry {
    let mut transactions = previous
        .map(|entry| entry.transactions.clone())
        .unwrap_or_default();

    for tx in fresh {
        transactions.insert(tx.id.clone(), tx);
    }

    CacheEntry {
        transactions,
        last_fetched_at_ms: now_ms,
    }
}

/// Cache giao dịch theo địa chỉ, lưu bền vững vào KeyValueStore.
///
/// Toàn bộ map được ghi lại sau mỗi lần hợp nhất, dưới cùng một khóa ghi,
/// nên hai lần làm mới cho hai địa chỉ khác nhau không ghi đè lên nhau.
pub struct TransactionCache {
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    address_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TransactionCache {
    /// Tải cache từ storage; dữ liệu thiếu hoặc hỏng cho ra cache rỗng
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries: HashMap<String, CacheEntry> =
            storage::load_json(store.as_ref(), TRANSACTIONS_KEY)
                .await
                .unwrap_or_default();
        info!("Đã tải cache giao dịch cho {} địa chỉ", entries.len());

        Self {
            store,
            entries: Mutex::new(entries),
            address_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, address: &str) -> Option<CacheEntry> {
        self.entries.lock().await.get(&normalize_address(address)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Khóa riêng cho một địa chỉ, giữ trong suốt chu trình kiểm tra -> tải -> hợp nhất
    pub async fn lock_address(&self, address: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.address_locks.lock().await;
            locks.entry(normalize_address(address)).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Hợp nhất giao dịch mới, lưu toàn bộ map và trả về danh sách đã sắp xếp
    pub async fn merge_and_persist(
        &self,
        address: &str,
        fresh: Vec<Transaction>,
        now_ms: i64,
    ) -> Vec<Transaction> {
        let key = normalize_address(address);
        let mut entries = self.entries.lock().await;

        let merged = merge_entries(entries.get(&key), fresh, now_ms);
        let sorted = merged.sorted();
        entries.insert(key, merged);

        // Lỗi ghi chỉ được log, dữ liệu trong bộ nhớ vẫn được cập nhật
        match storage::save_json(self.store.as_ref(), TRANSACTIONS_KEY, &*entries).await {
            Ok(()) => debug!("Đã lưu cache giao dịch ({} địa chỉ)", entries.len()),
            Err(e) => error!("Không thể lưu cache giao dịch: {}", e),
        }

        sorted
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use walletdash_common::{MemoryStore, TransactionKind, TransactionStatus};

    fn tx(id: &str, timestamp: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind: TransactionKind::Transfer,
            timestamp,
            status: TransactionStatus::Validated,
            block_number: (timestamp / 1000) as u64,
            counterparty_address: Some("0xbbb".to_string()),
            creator_address: "0xaaa".to_string(),
            endorsements: vec![],
        }
    }

    #[test]
    fn test_merge_keeps_old_and_dedups() {
        let previous = merge_entries(None, vec![tx("0x1", 1_000), tx("0x2", 2_000)], 10);
        let merged = merge_entries(Some(&previous), vec![tx("0x2", 2_000), tx("0x3", 3_000)], 20);

        let ids: Vec<String> = merged.sorted().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["0x3", "0x2", "0x1"]);
        assert_eq!(merged.last_fetched_at_ms, 20);
    }

    #[test]
    fn test_is_fresh() {
        let entry = merge_entries(None, vec![], 10_000);
        let window = Duration::from_secs(15);
        assert!(entry.is_fresh(10_000, window));
        assert!(entry.is_fresh(24_999, window));
        assert!(!entry.is_fresh(25_000, window));
        assert!(!entry.is_fresh(10_000, Duration::ZERO));
    }

    fn arb_txs() -> impl Strategy<Value = Vec<Transaction>> {
        prop::collection::vec((0u8..20, 0i64..1_000_000), 0..30).prop_map(|items| {
            items
                .into_iter()
                .map(|(id, ts)| tx(&format!("0x{:02x}", id), ts))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_merge_unique_and_sorted(cached in arb_txs(), fresh in arb_txs()) {
            let previous = merge_entries(None, cached.clone(), 1);
            let merged = merge_entries(Some(&previous), fresh.clone(), 2);
            let list = merged.sorted();

            let mut ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
            let total = ids.len();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), total);

            for pair in list.windows(2) {
                prop_assert!(pair[0].timestamp >= pair[1].timestamp);
            }

            // Không giao dịch nào bị mất
            for t in cached.iter().chain(fresh.iter()) {
                prop_assert!(merged.transactions.contains_key(&t.id));
            }
        }

        #[test]
        fn prop_merge_is_idempotent(fresh in arb_txs()) {
            let once = merge_entries(None, fresh.clone(), 5);
            let twice = merge_entries(Some(&once), fresh, 5);
            prop_assert_eq!(once, twice);
        }
    }

    #[tokio::test]
    async fn test_load_malformed_storage_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(TRANSACTIONS_KEY, "{\"0xaaa\": 42").await.unwrap();

        let cache = TransactionCache::load(store).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_merge_and_persist_round_trip() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = TransactionCache::load(store.clone()).await;

        let list = cache.merge_and_persist("0xAAA", vec![tx("0x1", 1_000)], 50).await;
        assert_eq!(list.len(), 1);
        cache.merge_and_persist("0xbbb", vec![tx("0x9", 9_000)], 60).await;

        // Tra cứu không phân biệt hoa thường
        assert!(cache.get("0xaaa").await.is_some());

        let reloaded = TransactionCache::load(store).await;
        assert_eq!(reloaded.len().await, 2);
        let entry = reloaded.get("0xAaA").await.unwrap();
        assert_eq!(entry.last_fetched_at_ms, 50);
        assert_eq!(entry.sorted()[0].id, "0x1");
    }
}
