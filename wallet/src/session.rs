// Standard library imports
use std::sync::Arc;

// Third party imports
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// Internal imports
use crate::events::{Notice, ProviderEvent, SessionEvent};
use crate::provider::WalletProvider;
use walletdash_common::storage::{load_json, save_json, LAST_ADDRESS_KEY};
use walletdash_common::utils::{same_address, to_hex_quantity};
use walletdash_common::KeyValueStore;

/// Dung lượng kênh sự kiện của session
pub const SESSION_EVENT_CAPACITY: usize = 64;

/// Kết quả kiểm tra mạng
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkStatus {
    /// Chưa kiểm tra, được coi là đúng mạng
    Unknown,
    Correct,
    Wrong,
}

/// Trạng thái tổng hợp của session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected(NetworkStatus),
}

/// Ảnh chụp trạng thái session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub address: Option<String>,
    pub connected: bool,
    pub network: NetworkStatus,
}

impl SessionState {
    fn disconnected() -> Self {
        Self {
            address: None,
            connected: false,
            network: NetworkStatus::Unknown,
        }
    }

    /// Chỉ `Wrong` mới là sai mạng
    pub fn network_correct(&self) -> bool {
        self.network != NetworkStatus::Wrong
    }

    pub fn status(&self) -> SessionStatus {
        if self.connected {
            SessionStatus::Connected(self.network)
        } else {
            SessionStatus::Disconnected
        }
    }
}

/// Session ví: địa chỉ đang hoạt động, trạng thái kết nối và mạng.
///
/// Địa chỉ đã kết nối được lưu dưới khóa `lastConnectedAddress` và khôi phục
/// khi khởi động. Mọi thay đổi được phát qua kênh `SessionEvent`.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    store: Arc<dyn KeyValueStore>,
    expected_chain_id: String,
    state: RwLock<SessionState>,
    changes: broadcast::Sender<SessionEvent>,
    notices: broadcast::Sender<Notice>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl WalletSession {
    /// Tạo session và khôi phục địa chỉ đã lưu (không kiểm tra mạng)
    pub async fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        store: Arc<dyn KeyValueStore>,
        expected_chain_id: u64,
    ) -> Self {
        let mut state = SessionState::disconnected();
        if let Some(address) = load_json::<String>(store.as_ref(), LAST_ADDRESS_KEY).await {
            if !address.trim().is_empty() {
                info!("Khôi phục địa chỉ đã kết nối: {}", address);
                state.address = Some(address);
                state.connected = true;
            }
        }

        let (changes, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        let (notices, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Self {
            provider,
            store,
            expected_chain_id: to_hex_quantity(expected_chain_id),
            state: RwLock::new(state),
            changes,
            notices,
            listener: Mutex::new(None),
        }
    }

    /// Tạo session và bắt đầu lắng nghe sự kiện provider
    pub async fn init(
        provider: Option<Arc<dyn WalletProvider>>,
        store: Arc<dyn KeyValueStore>,
        expected_chain_id: u64,
    ) -> Arc<Self> {
        let session = Arc::new(Self::new(provider, store, expected_chain_id).await);
        session.start_listening().await;
        session
    }

    pub fn expected_chain_id(&self) -> &str {
        &self.expected_chain_id
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn address(&self) -> Option<String> {
        self.state.read().await.address.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    pub async fn network_correct(&self) -> bool {
        self.state.read().await.network_correct()
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    /// Đăng ký nhận thay đổi của session
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.changes.subscribe()
    }

    /// Đăng ký nhận thông báo cho người dùng
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Yêu cầu quyền truy cập tài khoản từ provider.
    ///
    /// Không bao giờ trả lỗi: thiếu provider, provider từ chối hoặc không có
    /// tài khoản đều chỉ được ghi log và session giữ nguyên.
    pub async fn connect(&self) {
        let Some(provider) = self.provider.as_ref() else {
            self.notify(Notice::ProviderMissing);
            return;
        };

        let accounts = match provider.request("eth_requestAccounts", json!([])).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!("Kết nối ví thất bại: {}", e);
                return;
            }
        };

        match first_account(&accounts) {
            Some(account) => {
                self.adopt_account(account).await;
                self.check_network().await;
            }
            None => warn!("Provider không trả về tài khoản nào"),
        }
    }

    /// Ngắt kết nối: xóa địa chỉ đã lưu và đặt lại trạng thái mạng
    pub async fn disconnect(&self) {
        let previous = {
            let mut state = self.state.write().await;
            let previous = state.clone();
            *state = SessionState::disconnected();
            previous
        };

        if let Err(e) = self.store.remove(LAST_ADDRESS_KEY).await {
            error!("Không thể xóa địa chỉ đã lưu: {}", e);
        }

        if previous.address.is_some() {
            info!("Đã ngắt kết nối ví");
            self.emit(SessionEvent::AccountChanged(None));
        }
        if !previous.network_correct() {
            self.emit(SessionEvent::NetworkChanged(true));
        }
    }

    /// Hỏi chain id từ provider và so với chain mong đợi
    pub async fn check_network(&self) {
        let Some(provider) = self.provider.as_ref() else {
            return;
        };

        let actual = match provider.request("eth_chainId", json!([])).await {
            Ok(value) => match chain_id_from_value(&value) {
                Some(chain_id) => chain_id,
                None => {
                    warn!("Chain id không hợp lệ: {}", value);
                    self.set_network(NetworkStatus::Unknown).await;
                    return;
                }
            },
            Err(e) => {
                error!("Không thể kiểm tra mạng: {}", e);
                self.set_network(NetworkStatus::Unknown).await;
                return;
            }
        };

        if actual.eq_ignore_ascii_case(&self.expected_chain_id) {
            debug!("Ví đang ở đúng mạng {}", actual);
            self.set_network(NetworkStatus::Correct).await;
        } else {
            self.set_network(NetworkStatus::Wrong).await;
            self.notify(Notice::WrongNetwork {
                expected: self.expected_chain_id.clone(),
                actual,
            });
        }
    }

    /// Áp dụng một sự kiện từ provider vào session
    pub async fn apply_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                match accounts.into_iter().find(|a| !a.trim().is_empty()) {
                    Some(account) => self.adopt_account(account).await,
                    None => self.disconnect().await,
                }
            }
            ProviderEvent::ChainChanged(chain_id) => {
                debug!("Provider đổi chain sang {}", chain_id);
                self.check_network().await;
            }
        }
    }

    /// Bắt đầu lắng nghe sự kiện provider.
    ///
    /// Gọi nhiều lần chỉ tạo một listener. Trả về `true` nếu listener mới
    /// được tạo.
    pub async fn start_listening(self: &Arc<Self>) -> bool {
        let Some(provider) = self.provider.as_ref() else {
            return false;
        };

        let mut listener = self.listener.lock().await;
        if listener.as_ref().map_or(false, |handle| !handle.is_finished()) {
            return false;
        }

        let mut events = provider.subscribe();
        let session = Arc::downgrade(self);
        *listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        session.apply_provider_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Bỏ lỡ {} sự kiện provider", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Listener sự kiện provider dừng");
        }));
        true
    }

    /// Dừng listener sự kiện provider
    pub async fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
    }

    async fn adopt_account(&self, account: String) {
        let changed = {
            let mut state = self.state.write().await;
            let changed = !state
                .address
                .as_deref()
                .map_or(false, |current| same_address(current, &account));
            state.address = Some(account.clone());
            state.connected = true;
            changed
        };

        if let Err(e) = save_json(self.store.as_ref(), LAST_ADDRESS_KEY, &account).await {
            error!("Không thể lưu địa chỉ đã kết nối: {}", e);
        }

        if changed {
            info!("Tài khoản đang hoạt động: {}", account);
            self.emit(SessionEvent::AccountChanged(Some(account)));
        }
    }

    async fn set_network(&self, network: NetworkStatus) {
        let before = {
            let mut state = self.state.write().await;
            let before = state.network_correct();
            state.network = network;
            before
        };
        let after = network != NetworkStatus::Wrong;
        if before != after || network == NetworkStatus::Correct {
            self.emit(SessionEvent::NetworkChanged(after));
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.changes.send(event).is_err() {
            debug!("Không có subscriber cho sự kiện session");
        }
    }

    fn notify(&self, notice: Notice) {
        warn!("{}", notice.message());
        if self.notices.send(notice).is_err() {
            debug!("Không có subscriber cho thông báo");
        }
    }
}

fn first_account(value: &Value) -> Option<String> {
    value
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|account| !account.trim().is_empty())
        .map(str::to_string)
}

// Provider có thể trả chain id dạng hex hoặc dạng số
fn chain_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(hex) if !hex.trim().is_empty() => Some(hex.trim().to_string()),
        Value::Number(number) => number.as_u64().map(to_hex_quantity),
        _ => None,
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;
    use walletdash_common::config::SEPOLIA_CHAIN_ID;
    use walletdash_common::{DashError, DashResult, MemoryStore};

    struct FakeProvider {
        accounts: Mutex<Result<Vec<String>, String>>,
        chain_id: Mutex<Value>,
        chain_id_calls: AtomicUsize,
        events: broadcast::Sender<ProviderEvent>,
    }

    impl FakeProvider {
        fn new(accounts: &[&str], chain_id: &str) -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                accounts: Mutex::new(Ok(accounts.iter().map(|a| a.to_string()).collect())),
                chain_id: Mutex::new(json!(chain_id)),
                chain_id_calls: AtomicUsize::new(0),
                events,
            })
        }

        async fn set_chain_id(&self, chain_id: Value) {
            *self.chain_id.lock().await = chain_id;
        }

        fn emit(&self, event: ProviderEvent) {
            let _ = self.events.send(event);
        }
    }

    #[async_trait::async_trait]
    impl WalletProvider for FakeProvider {
        async fn request(&self, method: &str, _params: Value) -> DashResult<Value> {
            match method {
                "eth_requestAccounts" => match &*self.accounts.lock().await {
                    Ok(accounts) => Ok(json!(accounts)),
                    Err(reason) => Err(DashError::Provider(reason.clone())),
                },
                "eth_chainId" => {
                    self.chain_id_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(self.chain_id.lock().await.clone())
                }
                _ => Ok(Value::Null),
            }
        }

        fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
            self.events.subscribe()
        }
    }

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    async fn persisted_address(store: &Arc<dyn KeyValueStore>) -> Option<String> {
        load_json::<String>(store.as_ref(), LAST_ADDRESS_KEY).await
    }

    #[tokio::test]
    async fn test_connect_without_provider_emits_notice() {
        let session = WalletSession::new(None, store(), SEPOLIA_CHAIN_ID).await;
        let mut notices = session.subscribe_notices();

        session.connect().await;

        assert_eq!(notices.try_recv().unwrap(), Notice::ProviderMissing);
        assert_eq!(session.status().await, SessionStatus::Disconnected);
        assert!(session.address().await.is_none());
    }

    #[tokio::test]
    async fn test_notice_without_subscribers_is_dropped() {
        let session = WalletSession::new(None, store(), SEPOLIA_CHAIN_ID).await;

        session.connect().await;
        let mut notices = session.subscribe_notices();
        session.connect().await;

        assert_eq!(notices.try_recv().unwrap(), Notice::ProviderMissing);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_adopts_first_account_and_checks_network() {
        let store = store();
        let provider = FakeProvider::new(&["0xAbC", "0xdef"], "0xaa36a7");
        let session = WalletSession::new(Some(provider.clone() as Arc<dyn WalletProvider>), store.clone(), SEPOLIA_CHAIN_ID).await;
        let mut changes = session.subscribe();

        session.connect().await;

        let state = session.snapshot().await;
        assert_eq!(state.address.as_deref(), Some("0xAbC"));
        assert!(state.connected);
        assert_eq!(state.network, NetworkStatus::Correct);
        assert_eq!(persisted_address(&store).await.as_deref(), Some("0xAbC"));
        assert_eq!(
            changes.try_recv().unwrap(),
            SessionEvent::AccountChanged(Some("0xAbC".to_string()))
        );
        assert_eq!(changes.try_recv().unwrap(), SessionEvent::NetworkChanged(true));
    }

    #[tokio::test]
    async fn test_chain_id_comparison_ignores_case_and_accepts_numbers() {
        let provider = FakeProvider::new(&["0xabc"], "0xAA36A7");
        let session = WalletSession::new(Some(provider.clone() as Arc<dyn WalletProvider>), store(), SEPOLIA_CHAIN_ID).await;

        session.connect().await;
        assert_eq!(session.status().await, SessionStatus::Connected(NetworkStatus::Correct));

        provider.set_chain_id(json!(11155111u64)).await;
        session.check_network().await;
        assert!(session.network_correct().await);
    }

    #[tokio::test]
    async fn test_wrong_network_emits_notice() {
        let provider = FakeProvider::new(&["0xabc"], "0x1");
        let session = WalletSession::new(Some(provider as Arc<dyn WalletProvider>), store(), SEPOLIA_CHAIN_ID).await;
        let mut notices = session.subscribe_notices();

        session.connect().await;

        assert!(!session.network_correct().await);
        assert_eq!(
            notices.try_recv().unwrap(),
            Notice::WrongNetwork {
                expected: "0xaa36a7".to_string(),
                actual: "0x1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_or_empty_accounts_leave_session_untouched() {
        let provider = FakeProvider::new(&[], "0xaa36a7");
        let session = WalletSession::new(Some(provider.clone() as Arc<dyn WalletProvider>), store(), SEPOLIA_CHAIN_ID).await;

        session.connect().await;
        assert_eq!(session.status().await, SessionStatus::Disconnected);

        *provider.accounts.lock().await = Err("User rejected the request".to_string());
        session.connect().await;
        assert_eq!(session.status().await, SessionStatus::Disconnected);
        assert_eq!(provider.chain_id_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disconnect_clears_persisted_address() {
        let store = store();
        let provider = FakeProvider::new(&["0xabc"], "0x1");
        let session = WalletSession::new(Some(provider as Arc<dyn WalletProvider>), store.clone(), SEPOLIA_CHAIN_ID).await;
        session.connect().await;
        assert!(!session.network_correct().await);

        let mut changes = session.subscribe();
        session.disconnect().await;

        let state = session.snapshot().await;
        assert!(state.address.is_none());
        assert!(!state.connected);
        assert!(state.network_correct());
        assert!(persisted_address(&store).await.is_none());
        assert_eq!(changes.try_recv().unwrap(), SessionEvent::AccountChanged(None));
        assert_eq!(changes.try_recv().unwrap(), SessionEvent::NetworkChanged(true));
    }

    #[tokio::test]
    async fn test_restore_does_not_check_network() {
        let store = store();
        save_json(store.as_ref(), LAST_ADDRESS_KEY, "0xabc").await.unwrap();
        let provider = FakeProvider::new(&["0xabc"], "0x1");

        let session = WalletSession::new(Some(provider.clone() as Arc<dyn WalletProvider>), store, SEPOLIA_CHAIN_ID).await;

        assert_eq!(session.status().await, SessionStatus::Connected(NetworkStatus::Unknown));
        assert_eq!(session.address().await.as_deref(), Some("0xabc"));
        assert!(session.network_correct().await);
        assert_eq!(provider.chain_id_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_persisted_address_is_ignored() {
        let store = store();
        store.set(LAST_ADDRESS_KEY, "{not json").await.unwrap();

        let session = WalletSession::new(None, store, SEPOLIA_CHAIN_ID).await;
        assert_eq!(session.status().await, SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_provider_events_drive_session() {
        let store = store();
        let provider = FakeProvider::new(&["0xabc"], "0xaa36a7");
        let session = WalletSession::init(Some(provider.clone() as Arc<dyn WalletProvider>), store.clone(), SEPOLIA_CHAIN_ID).await;
        let mut changes = session.subscribe();

        provider.emit(ProviderEvent::AccountsChanged(vec!["0xBBB".to_string()]));
        let event = timeout(Duration::from_secs(1), changes.recv()).await.unwrap().unwrap();
        assert_eq!(event, SessionEvent::AccountChanged(Some("0xBBB".to_string())));
        assert_eq!(persisted_address(&store).await.as_deref(), Some("0xBBB"));

        provider.set_chain_id(json!("0x1")).await;
        provider.emit(ProviderEvent::ChainChanged("0x1".to_string()));
        let event = timeout(Duration::from_secs(1), changes.recv()).await.unwrap().unwrap();
        assert_eq!(event, SessionEvent::NetworkChanged(false));

        provider.emit(ProviderEvent::AccountsChanged(vec![]));
        let event = timeout(Duration::from_secs(1), changes.recv()).await.unwrap().unwrap();
        assert_eq!(event, SessionEvent::AccountChanged(None));
        assert_eq!(session.status().await, SessionStatus::Disconnected);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_listening_is_idempotent_and_shutdown_stops_it() {
        let provider = FakeProvider::new(&["0xabc"], "0xaa36a7");
        let session = WalletSession::init(Some(provider.clone() as Arc<dyn WalletProvider>), store(), SEPOLIA_CHAIN_ID).await;

        assert!(!session.start_listening().await);
        assert_eq!(provider.events.receiver_count(), 1);

        session.shutdown().await;
        let mut changes = session.subscribe();
        provider.emit(ProviderEvent::AccountsChanged(vec!["0xccc".to_string()]));

        let waited = timeout(Duration::from_millis(200), changes.recv()).await;
        assert!(waited.is_err());
        assert!(session.address().await.is_none());
    }
}
