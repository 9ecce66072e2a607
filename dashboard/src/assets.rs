// Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

// Third party imports
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

// Internal imports
use walletdash_blockchain::{ChainSource, PriceProvider};
use walletdash_common::storage::{load_json, save_json, ASSETS_KEY};
use walletdash_common::utils::normalize_address;
use walletdash_common::{DashResult, Holding, KeyValueStore, TokenBalance, TrackedToken};

/// Snapshot tài sản đã lưu, theo địa chỉ (chữ thường)
type AssetSnapshots = HashMap<String, Vec<TokenBalance>>;

/// Trạng thái hiển thị của danh sách tài sản
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetState {
    pub assets: Vec<TokenBalance>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AssetState {
    /// Tổng giá trị USD của các tài sản
    pub fn total_usd(&self) -> f64 {
        self.assets.iter().map(|asset| asset.usd_value).sum()
    }
}

/// View-state tài sản: số dư native + token theo dõi, định giá bằng USD
pub struct AssetStore {
    chain: Arc<dyn ChainSource>,
    prices: Arc<dyn PriceProvider>,
    store: Arc<dyn KeyValueStore>,
    tokens: Vec<TrackedToken>,
    state: RwLock<AssetState>,
    in_flight: AtomicUsize,
    generation: AtomicU64,
    snapshot_lock: Mutex<()>,
}

// Giảm bộ đếm refresh khi kết thúc, kể cả khi future bị hủy
struct LoadingGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn start(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AssetStore {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        prices: Arc<dyn PriceProvider>,
        store: Arc<dyn KeyValueStore>,
        tokens: Vec<TrackedToken>,
    ) -> Self {
        Self {
            chain,
            prices,
            store,
            tokens,
            state: RwLock::new(AssetState::default()),
            in_flight: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            snapshot_lock: Mutex::new(()),
        }
    }

    pub fn tokens(&self) -> &[TrackedToken] {
        &self.tokens
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn snapshot(&self) -> AssetState {
        let mut state = self.state.read().await.clone();
        state.loading = self.is_loading();
        state
    }

    pub async fn assets(&self) -> Vec<TokenBalance> {
        self.state.read().await.assets.clone()
    }

    /// Thế hệ hiện tại, tăng sau mỗi lần `clear()`
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Xóa tài sản hiện tại và trả về thế hệ mới.
    /// Kết quả của các lần tải bắt đầu trước đó sẽ bị bỏ.
    pub async fn clear(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;
        state.assets.clear();
        state.error = None;
        generation
    }

    /// Tải tài sản, dùng snapshot đã lưu nếu không bắt buộc làm mới
    pub async fn load_assets(&self, address: Option<&str>, force_refresh: bool) {
        self.load_assets_for(self.generation(), address, force_refresh).await
    }

    /// Như `load_assets`, kết quả chỉ được áp dụng khi vẫn ở thế hệ `generation`
    pub async fn load_assets_for(&self, generation: u64, address: Option<&str>, force_refresh: bool) {
        let Some(address) = active_address(address) else {
            self.reset_without_address().await;
            return;
        };

        if !force_refresh {
            if let Some(assets) = self.cached_assets(address).await {
                let mut state = self.state.write().await;
                if self.generation() != generation {
                    debug!("Bỏ snapshot tài sản cũ của {}", address);
                    return;
                }
                debug!("Dùng snapshot tài sản đã lưu cho {}", address);
                state.assets = assets;
                state.error = None;
                return;
            }
        }

        self.refresh_assets_for(generation, Some(address)).await;
    }

    /// Làm mới tài sản từ chain và price feed
    pub async fn refresh_assets(&self, address: Option<&str>) {
        self.refresh_assets_for(self.generation(), address).await
    }

    async fn refresh_assets_for(&self, generation: u64, address: Option<&str>) {
        let Some(address) = active_address(address) else {
            self.reset_without_address().await;
            return;
        };

        let _loading = LoadingGuard::start(&self.in_flight);
        info!("Làm mới tài sản cho {}", address);

        let assets = self.compose(address).await;
        let saved = self.save_snapshot(address, &assets).await;

        // clear() tăng thế hệ trước khi lấy khóa ghi
        let mut state = self.state.write().await;
        if self.generation() != generation {
            debug!("Bỏ kết quả tài sản cũ của {}", address);
            return;
        }
        state.assets = assets;
        state.error = match saved {
            Ok(()) => None,
            Err(e) => {
                error!("Không thể lưu snapshot tài sản: {}", e);
                Some(e.to_string())
            }
        };
    }

    async fn compose(&self, address: &str) -> Vec<TokenBalance> {
        let symbols: Vec<String> = self.tokens.iter().map(|t| t.symbol.clone()).collect();
        let needs_balance = self.tokens.iter().any(|t| t.holding == Holding::Native);

        let balance = async {
            if needs_balance {
                self.chain.fetch_balance(address).await
            } else {
                0.0
            }
        };
        let (balance, quotes) = tokio::join!(balance, self.prices.get_prices(&symbols));

        self.tokens
            .iter()
            .map(|token| {
                let amount = match token.holding {
                    Holding::Native => balance,
                    Holding::Fixed(amount) => amount,
                };
                TokenBalance::from_quote(&token.symbol, amount, quotes.get(&token.symbol))
            })
            .collect()
    }

    async fn cached_assets(&self, address: &str) -> Option<Vec<TokenBalance>> {
        let mut snapshots = load_json::<AssetSnapshots>(self.store.as_ref(), ASSETS_KEY).await?;
        snapshots.remove(&normalize_address(address))
    }

    async fn save_snapshot(&self, address: &str, assets: &[TokenBalance]) -> DashResult<()> {
        let _guard = self.snapshot_lock.lock().await;
        let mut snapshots = load_json::<AssetSnapshots>(self.store.as_ref(), ASSETS_KEY)
            .await
            .unwrap_or_default();
        snapshots.insert(normalize_address(address), assets.to_vec());
        save_json(self.store.as_ref(), ASSETS_KEY, &snapshots).await
    }

    async fn reset_without_address(&self) {
        warn!("Chưa có địa chỉ ví, bỏ qua việc tải tài sản");
        let mut state = self.state.write().await;
        state.assets.clear();
    }
}

fn active_address(address: Option<&str>) -> Option<&str> {
    address.map(str::trim).filter(|a| !a.is_empty())
}
