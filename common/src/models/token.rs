use serde::{Deserialize, Serialize};

/// Số dư một token kèm giá trị USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub symbol: String,
    /// Số lượng theo đơn vị native của token
    pub amount: f64,
    pub usd_value: f64,
    pub change_24h_percent: f64,
}

impl TokenBalance {
    /// Tạo số dư từ số lượng và báo giá (báo giá thiếu được coi là giá 0)
    pub fn from_quote(symbol: &str, amount: f64, quote: Option<&PriceQuote>) -> Self {
        let (usd, change) = quote
            .map(|q| (q.usd, q.usd_24h_change_percent))
            .unwrap_or((0.0, 0.0));

        Self {
            symbol: symbol.to_string(),
            amount,
            usd_value: amount * usd,
            change_24h_percent: change,
        }
    }
}

/// Báo giá spot của một token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub usd: f64,
    pub usd_24h_change_percent: f64,
}

impl PriceQuote {
    /// Báo giá 0, nghĩa là "chưa biết giá"
    pub fn unknown(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            usd: 0.0,
            usd_24h_change_percent: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.usd > 0.0
    }
}
