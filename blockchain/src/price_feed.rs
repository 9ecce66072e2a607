// Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Third party imports
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

// Internal imports
use walletdash_common::{DashConfig, DashError, DashResult, PriceQuote, PriceSource};

/// Nguồn báo giá token
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Báo giá cho các symbol. Không bao giờ lỗi: giá 0 nghĩa là "chưa biết".
    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote>;
}

#[derive(Debug, Deserialize)]
struct FeedQuote {
    #[serde(default)]
    usd: f64,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

/// Client cho price feed REST (dạng CoinGecko simple/price)
pub struct FeedPriceClient {
    url: String,
    client: Client,
    feed_ids: HashMap<String, String>,
}

impl FeedPriceClient {
    /// `feed_ids` là bảng symbol -> feed id, symbol không phân biệt hoa thường
    pub fn new(url: impl Into<String>, feed_ids: HashMap<String, String>, timeout: Duration) -> DashResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let feed_ids = feed_ids
            .into_iter()
            .map(|(symbol, id)| (symbol.to_ascii_uppercase(), id))
            .collect();

        Ok(Self {
            url: url.into(),
            client,
            feed_ids,
        })
    }

    pub fn from_config(config: &DashConfig) -> DashResult<Self> {
        Self::new(
            config.price_feed_url.clone(),
            config.feed_ids.clone(),
            config.request_timeout(),
        )
    }

    pub fn feed_id(&self, symbol: &str) -> Option<&str> {
        self.feed_ids.get(&symbol.to_ascii_uppercase()).map(String::as_str)
    }

    async fn request_prices(&self, ids: &[&str]) -> DashResult<HashMap<String, FeedQuote>> {
        let joined = ids.join(",");
        debug!("Lấy giá cho {}", joined);

        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("ids", joined.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(DashError::Network(format!("price feed HTTP {}", resp.status())));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PriceProvider for FeedPriceClient {
    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        // (symbol, feed id); symbol không có trong bảng bị bỏ qua
        let mut mapped: Vec<(&str, &str)> = Vec::new();
        let mut ids: Vec<&str> = Vec::new();
        for symbol in symbols {
            match self.feed_id(symbol) {
                Some(id) => {
                    if !mapped.iter().any(|(s, _)| *s == symbol.as_str()) {
                        mapped.push((symbol.as_str(), id));
                    }
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                None => debug!("Không có feed id cho {}, bỏ qua", symbol),
            }
        }

        if ids.is_empty() {
            return HashMap::new();
        }

        match self.request_prices(&ids).await {
            Ok(data) => mapped
                .into_iter()
                .filter_map(|(symbol, id)| {
                    data.get(id).map(|quote| {
                        let quote = PriceQuote {
                            symbol: symbol.to_string(),
                            usd: quote.usd,
                            usd_24h_change_percent: quote.usd_24h_change.unwrap_or(0.0),
                        };
                        (symbol.to_string(), quote)
                    })
                })
                .collect(),
            Err(e) => {
                error!("Không thể lấy giá token: {}", e);
                symbols
                    .iter()
                    .map(|symbol| (symbol.clone(), PriceQuote::unknown(symbol)))
                    .collect()
            }
        }
    }
}

/// Bảng giá tĩnh, dùng khi không muốn gọi price feed
pub struct StaticPriceProvider {
    prices: HashMap<String, f64>,
}

impl StaticPriceProvider {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        let prices = prices
            .into_iter()
            .map(|(symbol, usd)| (symbol.to_ascii_uppercase(), usd))
            .collect();
        Self { prices }
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&symbol.to_ascii_uppercase()).copied()
    }
}

impl Default for StaticPriceProvider {
    fn default() -> Self {
        let prices = [("ETH", 2000.0), ("USDC", 1.0), ("DAI", 1.0)]
            .iter()
            .map(|(symbol, usd)| (symbol.to_string(), *usd))
            .collect();
        Self::new(prices)
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    async fn get_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        symbols
            .iter()
            .map(|symbol| {
                let quote = match self.price(symbol) {
                    Some(usd) => PriceQuote {
                        symbol: symbol.clone(),
                        usd,
                        usd_24h_change_percent: 0.0,
                    },
                    None => {
                        warn!("Bảng giá tĩnh không có {}", symbol);
                        PriceQuote::unknown(symbol)
                    }
                };
                (symbol.clone(), quote)
            })
            .collect()
    }
}

/// Tạo price provider theo cấu hình
pub fn create_price_provider(config: &DashConfig) -> DashResult<Arc<dyn PriceProvider>> {
    match config.price_source {
        PriceSource::Feed => Ok(Arc::new(FeedPriceClient::from_config(config)?)),
        PriceSource::Static => Ok(Arc::new(StaticPriceProvider::default())),
    }
}
