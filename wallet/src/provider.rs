// Third party imports
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

// Internal imports
use crate::events::ProviderEvent;
use walletdash_blockchain::JsonRpcClient;
use walletdash_common::{DashConfig, DashResult};

/// Dung lượng kênh sự kiện của provider
pub const PROVIDER_EVENT_CAPACITY: usize = 64;

/// Wallet provider: kết nối ví và proxy JSON-RPC tới chain
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Gửi một request `{method, params}` và trả về result
    async fn request(&self, method: &str, params: Value) -> DashResult<Value>;

    /// Đăng ký nhận sự kiện accountsChanged / chainChanged
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Provider chạy headless: trả về danh sách tài khoản cấu hình sẵn,
/// mọi method khác được chuyển tiếp tới node JSON-RPC.
pub struct NodeProvider {
    rpc: JsonRpcClient,
    accounts: RwLock<Vec<String>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl NodeProvider {
    pub fn new(rpc: JsonRpcClient, accounts: Vec<String>) -> Self {
        let (events, _) = broadcast::channel(PROVIDER_EVENT_CAPACITY);
        Self {
            rpc,
            accounts: RwLock::new(accounts),
            events,
        }
    }

    pub fn from_config(config: &DashConfig) -> DashResult<Self> {
        let rpc = JsonRpcClient::from_config(config)?;
        let accounts = config.wallet_address.iter().cloned().collect();
        Ok(Self::new(rpc, accounts))
    }

    /// Đổi danh sách tài khoản và phát sự kiện accountsChanged
    pub async fn set_accounts(&self, accounts: Vec<String>) {
        *self.accounts.write().await = accounts.clone();
        self.emit(ProviderEvent::AccountsChanged(accounts));
    }

    /// Phát sự kiện chainChanged
    pub fn notify_chain_changed(&self, chain_id_hex: &str) {
        self.emit(ProviderEvent::ChainChanged(chain_id_hex.to_string()));
    }

    fn emit(&self, event: ProviderEvent) {
        // Không có subscriber không phải là lỗi
        if self.events.send(event).is_err() {
            debug!("Không có subscriber cho sự kiện provider");
        }
    }
}

#[async_trait]
impl WalletProvider for NodeProvider {
    async fn request(&self, method: &str, params: Value) -> DashResult<Value> {
        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                let accounts = self.accounts.read().await.clone();
                Ok(json!(accounts))
            }
            _ => Ok(self
                .rpc
                .call_optional::<Value>(method, params)
                .await?
                .unwrap_or(Value::Null)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
