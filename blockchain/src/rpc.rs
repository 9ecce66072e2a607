// Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// Third party imports
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

// Internal imports
use walletdash_common::utils::{parse_hex_u64, to_hex_quantity};
use walletdash_common::{DashConfig, DashError, DashResult};

/// Giao dịch trong block (dạng full transaction object)
#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
}

/// Block trả về từ eth_getBlockByNumber
#[derive(Debug, Clone, Deserialize)]
pub struct RpcBlock {
    pub number: String,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

impl RpcBlock {
    pub fn number(&self) -> DashResult<u64> {
        parse_hex_u64(&self.number)
    }

    /// Timestamp của block theo ms
    pub fn timestamp_ms(&self) -> DashResult<i64> {
        let secs = parse_hex_u64(&self.timestamp)?;
        let secs = i64::try_from(secs).map_err(|_| {
            DashError::Network(format!("block timestamp out of range: {}", self.timestamp))
        })?;
        Ok(secs.saturating_mul(1000))
    }
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<RpcErrorDetail>,
}

#[derive(Deserialize)]
struct RpcErrorDetail {
    code: i64,
    message: String,
}

/// Client JSON-RPC qua HTTP
pub struct JsonRpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> DashResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Tạo client từ cấu hình; thiếu project id là lỗi cấu hình
    pub fn from_config(config: &DashConfig) -> DashResult<Self> {
        Self::new(config.rpc_url()?, config.request_timeout())
    }

    /// Gọi một method, `result: null` được trả về là `None`
    pub async fn call_optional<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> DashResult<Option<R>> {
        let request = Request {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!("JSON-RPC {} (id {})", method, request.id);

        let resp = self.client.post(&self.url).json(&request).send().await?;
        if !resp.status().is_success() {
            return Err(DashError::Network(format!("{} HTTP {}", method, resp.status())));
        }

        let envelope: Envelope<R> = resp.json().await?;
        if let Some(err) = envelope.error {
            return Err(DashError::Network(format!(
                "{} error code={} message={}",
                method, err.code, err.message
            )));
        }
        Ok(envelope.result)
    }

    /// Gọi một method, thiếu result là lỗi
    pub async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> DashResult<R> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| DashError::Network(format!("{} missing result", method)))
    }

    /// eth_blockNumber
    pub async fn block_number(&self) -> DashResult<u64> {
        let hex: String = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&hex)
    }

    /// eth_getBlockByNumber với full transaction objects
    pub async fn get_block_with_transactions(&self, number: u64) -> DashResult<Option<RpcBlock>> {
        self.call_optional("eth_getBlockByNumber", json!([to_hex_quantity(number), true]))
            .await
    }

    /// eth_getBalance ở block "latest", trả về wei dạng hex
    pub async fn get_balance(&self, address: &str) -> DashResult<String> {
        self.call("eth_getBalance", json!([address, "latest"])).await
    }

    /// eth_chainId
    pub async fn chain_id(&self) -> DashResult<String> {
        self.call("eth_chainId", json!([])).await
    }
}
