use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One asset's market data for a single refresh cycle.
///
/// Quotes are never merged: every successful fetch replaces the whole map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Feed identifier (e.g., "bitcoin")
    pub asset_id: String,

    /// Current price in USD
    pub unit_price_usd: f64,

    /// Price change over the last 24h, in percent (e.g., -2.5)
    pub change_24h_percent: f64,

    #[serde(default)]
    pub market_cap_usd: Option<f64>,

    #[serde(default)]
    pub volume_usd: Option<f64>,

    /// Last 7 days of prices, oldest first. Empty when the endpoint has none.
    #[serde(default)]
    pub sparkline_7d: Vec<f64>,

    /// Ticker symbol as reported by the feed, uppercased
    #[serde(default)]
    pub symbol: Option<String>,

    /// Display name as reported by the feed
    #[serde(default)]
    pub name: Option<String>,
}

impl PriceQuote {
    /// A bare quote with only price and 24h change.
    pub fn new(asset_id: impl Into<String>, unit_price_usd: f64, change_24h_percent: f64) -> Self {
        Self {
            asset_id: asset_id.into(),
            unit_price_usd,
            change_24h_percent,
            market_cap_usd: None,
            volume_usd: None,
            sparkline_7d: Vec::new(),
            symbol: None,
            name: None,
        }
    }

    pub fn with_market(mut self, market_cap_usd: f64, volume_usd: f64) -> Self {
        self.market_cap_usd = Some(market_cap_usd);
        self.volume_usd = Some(volume_usd);
        self
    }

    pub fn with_sparkline(mut self, points: Vec<f64>) -> Self {
        self.sparkline_7d = points;
        self
    }

    pub fn with_identity(mut self, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into().to_uppercase());
        self.name = Some(name.into());
        self
    }
}

/// asset id → quote, as returned by one feed call.
pub type QuoteMap = HashMap<String, PriceQuote>;
