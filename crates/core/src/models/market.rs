use serde::{Deserialize, Serialize};

/// One coin in the market overview list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCoin {
    pub asset_id: String,
    pub name: String,

    /// Ticker symbol, uppercased
    pub symbol: String,

    pub price_usd: f64,
    pub change_24h_percent: f64,

    /// Market capitalisation in USD (0 when the feed did not report it)
    pub market_cap_usd: f64,

    /// 24h trading volume in USD (0 when the feed did not report it)
    pub volume_usd: f64,
}
