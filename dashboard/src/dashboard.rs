// Standard library imports
use std::sync::Arc;

// Third party imports
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Internal imports
use crate::assets::{AssetState, AssetStore};
use crate::transactions::TransactionStore;
use walletdash_blockchain::{create_price_provider, ChainReader, ChainSource, PriceProvider};
use walletdash_common::{DashConfig, DashResult, FileStore, KeyValueStore, Transaction, TrackedToken};
use walletdash_wallet::{NodeProvider, SessionEvent, SessionState, WalletProvider, WalletSession};

/// Toàn bộ trạng thái hiển thị của dashboard tại một thời điểm
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub session: SessionState,
    pub network_correct: bool,
    pub assets: AssetState,
    pub transactions: Vec<Transaction>,
}

/// Context object của dashboard: session, chain reader, price provider và
/// các view-state, được tạo một lần rồi truyền tường minh.
pub struct Dashboard {
    session: Arc<WalletSession>,
    assets: Arc<AssetStore>,
    transactions: Arc<TransactionStore>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Dashboard {
    pub fn new(
        session: Arc<WalletSession>,
        chain: Arc<dyn ChainSource>,
        prices: Arc<dyn PriceProvider>,
        store: Arc<dyn KeyValueStore>,
        tokens: Vec<TrackedToken>,
    ) -> Arc<Self> {
        let assets = Arc::new(AssetStore::new(chain.clone(), prices, store, tokens));
        let transactions = Arc::new(TransactionStore::new(chain));

        Arc::new(Self {
            session,
            assets,
            transactions,
            watcher: Mutex::new(None),
        })
    }

    /// Dựng dashboard đầy đủ từ cấu hình
    pub async fn from_config(config: &DashConfig) -> DashResult<Arc<Self>> {
        config.validate()?;

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.storage_dir).await?);
        let provider: Arc<dyn WalletProvider> = Arc::new(NodeProvider::from_config(config)?);
        let chain: Arc<dyn ChainSource> = Arc::new(ChainReader::from_config(config, store.clone()).await?);
        let prices = create_price_provider(config)?;

        let session = WalletSession::init(Some(provider), store.clone(), config.expected_chain_id).await;
        info!("Dashboard sẵn sàng, chain mong đợi {}", session.expected_chain_id());

        Ok(Self::new(session, chain, prices, store, config.tokens.clone()))
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn assets(&self) -> &Arc<AssetStore> {
        &self.assets
    }

    pub fn transactions(&self) -> &Arc<TransactionStore> {
        &self.transactions
    }

    /// Tải tài sản và giao dịch của địa chỉ đang hoạt động
    pub async fn refresh_all(&self, force_refresh: bool) {
        let address = self.session.address().await;
        let address = address.as_deref();
        tokio::join!(
            self.assets.load_assets(address, force_refresh),
            self.transactions.refresh_transactions(address),
        );
    }

    pub async fn view(&self) -> DashboardView {
        let session = self.session.snapshot().await;
        DashboardView {
            network_correct: session.network_correct(),
            session,
            assets: self.assets.snapshot().await,
            transactions: self.transactions.transactions().await,
        }
    }

    /// Theo dõi thay đổi của session. Gọi nhiều lần chỉ tạo một watcher.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut watcher = self.watcher.lock().await;
        if watcher.as_ref().map_or(false, |handle| !handle.is_finished()) {
            return false;
        }

        let mut events = self.session.subscribe();
        let dashboard = Arc::downgrade(self);
        *watcher = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(dashboard) = dashboard.upgrade() else {
                            break;
                        };
                        dashboard.handle_session_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Bỏ lỡ {} sự kiện session", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
        true
    }

    /// Dừng watcher và listener của session
    pub async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().await.take() {
            handle.abort();
        }
        self.session.shutdown().await;
    }

    async fn handle_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::AccountChanged(address) => {
                let asset_generation = self.assets.clear().await;
                let tx_generation = self.transactions.clear().await;

                let Some(address) = address else {
                    info!("Ví đã ngắt kết nối, xóa dữ liệu hiển thị");
                    return;
                };

                let assets = self.assets.clone();
                let account = address.clone();
                tokio::spawn(async move {
                    assets.load_assets_for(asset_generation, Some(&account), false).await
                });

                let transactions = self.transactions.clone();
                tokio::spawn(async move {
                    transactions
                        .refresh_transactions_for(tx_generation, Some(&address))
                        .await;
                });
            }
            SessionEvent::NetworkChanged(correct) => {
                debug!("Trạng thái mạng: {}", if correct { "đúng" } else { "sai" });
            }
        }
    }
}
