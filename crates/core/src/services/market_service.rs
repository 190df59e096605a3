use std::cmp::Ordering;

use crate::models::market::MarketCoin;
use crate::models::quote::QuoteMap;
use crate::providers::coingecko::symbol_for_id;

/// Builds the market overview list from the cycle's quotes.
pub struct MarketService;

impl MarketService {
    pub fn new() -> Self {
        Self
    }

    /// One card per configured market id that has a quote this cycle,
    /// largest market cap first.
    pub fn overview(&self, market_ids: &[String], quotes: &QuoteMap) -> Vec<MarketCoin> {
        let mut coins: Vec<MarketCoin> = market_ids
            .iter()
            .filter_map(|id| quotes.get(id))
            .map(|q| {
                let symbol = q
                    .symbol
                    .clone()
                    .or_else(|| symbol_for_id(&q.asset_id).map(str::to_string))
                    .unwrap_or_else(|| q.asset_id.to_uppercase());
                MarketCoin {
                    asset_id: q.asset_id.clone(),
                    name: q.name.clone().unwrap_or_else(|| symbol.clone()),
                    symbol,
                    price_usd: q.unit_price_usd,
                    change_24h_percent: q.change_24h_percent,
                    market_cap_usd: q.market_cap_usd.unwrap_or(0.0),
                    volume_usd: q.volume_usd.unwrap_or(0.0),
                }
            })
            .collect();

        coins.sort_by(|a, b| {
            b.market_cap_usd
                .partial_cmp(&a.market_cap_usd)
                .unwrap_or(Ordering::Equal)
        });
        coins
    }

    /// Case-insensitive filter on symbol or name; a blank term keeps everything.
    pub fn search<'a>(&self, coins: &'a [MarketCoin], term: &str) -> Vec<&'a MarketCoin> {
        let term = term.trim().to_lowercase();
        coins
            .iter()
            .filter(|c| {
                term.is_empty()
                    || c.symbol.to_lowercase().contains(&term)
                    || c.name.to_lowercase().contains(&term)
            })
            .collect()
    }
}

impl Default for MarketService {
    fn default() -> Self {
        Self::new()
    }
}
