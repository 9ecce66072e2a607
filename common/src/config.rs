// Standard library imports
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Third party imports
use dotenv::dotenv;
use serde::{Deserialize, Serialize};

// Internal imports
use crate::error::{DashError, DashResult};

/// Chain id của Sepolia testnet
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Nguồn giá token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Price feed REST API
    Feed,
    /// Bảng giá tĩnh, không gọi mạng
    Static,
}

/// Cách xác định số lượng của một token được theo dõi
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "lowercase")]
pub enum Holding {
    /// Số dư native đọc từ chain
    Native,
    /// Số lượng cố định lấy từ cấu hình
    Fixed(f64),
}

/// Token hiển thị trên dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedToken {
    pub symbol: String,
    pub holding: Holding,
}

impl TrackedToken {
    pub fn native(symbol: &str) -> Self {
        Self { symbol: symbol.to_string(), holding: Holding::Native }
    }

    pub fn fixed(symbol: &str, amount: f64) -> Self {
        Self { symbol: symbol.to_string(), holding: Holding::Fixed(amount) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashConfig {
    /// Project id của RPC provider, bắt buộc cho mọi tính năng đọc chain
    #[serde(default)]
    pub api_project_id: Option<String>,
    /// Chain id mà ví phải kết nối tới
    pub expected_chain_id: u64,
    pub rpc_base_url: String,
    pub price_feed_url: String,
    pub price_source: PriceSource,
    /// Thư mục chứa file của FileStore
    pub storage_dir: PathBuf,
    /// Cửa sổ tươi của cache giao dịch (giây)
    pub freshness_window_secs: u64,
    /// Số block gần nhất được quét mỗi lần làm mới
    pub block_window: u64,
    /// Timeout cho mọi request HTTP (giây)
    pub request_timeout_secs: u64,
    /// Tài khoản mà NodeProvider trả về khi chạy headless
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Bảng symbol -> feed id của price feed
    pub feed_ids: HashMap<String, String>,
    pub tokens: Vec<TrackedToken>,
}

impl DashConfig {
    pub fn new() -> Self {
        Self {
            api_project_id: None,
            expected_chain_id: SEPOLIA_CHAIN_ID,
            rpc_base_url: "https://sepolia.infura.io/v3".to_string(),
            price_feed_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            price_source: PriceSource::Feed,
            storage_dir: PathBuf::from("./data"),
            freshness_window_secs: 15,
            block_window: 3,
            request_timeout_secs: 20,
            wallet_address: None,
            log_dir: None,
            feed_ids: default_feed_ids(),
            tokens: default_tokens(),
        }
    }

    /// Đọc cấu hình từ biến môi trường (có hỗ trợ file .env)
    pub fn from_env() -> DashResult<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Đọc cấu hình qua một hàm tra cứu, các khóa thiếu dùng giá trị mặc định
    pub fn from_lookup<F>(lookup: F) -> DashResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        config.api_project_id = lookup("API_PROJECT_ID").filter(|v| !v.trim().is_empty());
        if let Some(chain_id) = lookup("DEFAULT_CHAIN_ID") {
            config.expected_chain_id = parse_number("DEFAULT_CHAIN_ID", &chain_id)?;
        }
        if let Some(url) = lookup("RPC_BASE_URL") {
            config.rpc_base_url = url;
        }
        if let Some(url) = lookup("PRICE_FEED_URL") {
            config.price_feed_url = url;
        }
        if let Some(source) = lookup("PRICE_SOURCE") {
            config.price_source = match source.to_ascii_lowercase().as_str() {
                "feed" => PriceSource::Feed,
                "static" => PriceSource::Static,
                other => {
                    return Err(DashError::Config(format!("unknown PRICE_SOURCE '{}'", other)))
                }
            };
        }
        if let Some(dir) = lookup("STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("FRESHNESS_WINDOW_SECS") {
            config.freshness_window_secs = parse_number("FRESHNESS_WINDOW_SECS", &secs)?;
        }
        if let Some(window) = lookup("BLOCK_WINDOW") {
            config.block_window = parse_number("BLOCK_WINDOW", &window)?;
        }
        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &secs)?;
        }
        config.wallet_address = lookup("WALLET_ADDRESS").filter(|v| !v.trim().is_empty());
        config.log_dir = lookup("LOG_DIR").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> DashResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: DashConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> DashResult<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> DashResult<()> {
        if self.block_window == 0 {
            return Err(DashError::Config("block_window must be at least 1".to_string()));
        }
        if self.tokens.is_empty() {
            return Err(DashError::Config("token list is empty".to_string()));
        }
        Ok(())
    }

    /// Project id, thiếu là lỗi cấu hình không thể khôi phục
    pub fn require_project_id(&self) -> DashResult<&str> {
        self.api_project_id
            .as_deref()
            .ok_or_else(|| DashError::Config("API_PROJECT_ID is not defined".to_string()))
    }

    /// URL JSON-RPC đầy đủ
    pub fn rpc_url(&self) -> DashResult<String> {
        let project_id = self.require_project_id()?;
        Ok(format!("{}/{}", self.rpc_base_url.trim_end_matches('/'), project_id))
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for DashConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_feed_ids() -> HashMap<String, String> {
    [
        ("ETH", "ethereum"),
        ("BTC", "bitcoin"),
        ("USDT", "tether"),
        ("USDC", "usd-coin"),
        ("DAI", "dai"),
    ]
    .iter()
    .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
    .collect()
}

fn default_tokens() -> Vec<TrackedToken> {
    vec![
        TrackedToken::native("ETH"),
        TrackedToken::fixed("USDT", 1000.0),
        TrackedToken::fixed("BTC", 0.05),
    ]
}

fn parse_number(key: &str, value: &str) -> DashResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| DashError::Config(format!("{} must be a number: {}", key, e)))
}
