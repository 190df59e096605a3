use chrono::{DateTime, NaiveDate, Utc};

use crate::models::chart::{PerformanceHistory, PerformancePoint};
use crate::models::holding::{Holding, HoldingConfig};
use crate::models::market::MarketCoin;
use crate::models::quote::{PriceQuote, QuoteMap};
use crate::models::snapshot::{PortfolioSnapshot, SnapshotSource};
use crate::services::valuation_service::value_portfolio;

/// 2025-07-24T00:00:00Z, the date of the last sample history point.
const SAMPLE_AS_OF_SECS: i64 = 1_753_315_200;

// (asset id, symbol, name, price, 24h change %, quantity, market cap, volume, 7d series)
type SampleRow = (&'static str, &'static str, &'static str, f64, f64, f64, f64, f64, [f64; 7]);

const SAMPLE_HOLDINGS: &[SampleRow] = &[
    (
        "bitcoin", "BTC", "Bitcoin", 45_230.50, 2.5, 0.25, 880_000_000_000.0, 25_000_000_000.0,
        [43_950.0, 44_310.0, 44_120.0, 44_780.0, 45_020.0, 44_130.0, 45_230.5],
    ),
    (
        "ethereum", "ETH", "Ethereum", 2_310.75, 5.2, 5.8, 280_000_000_000.0, 15_000_000_000.0,
        [2_150.0, 2_180.4, 2_205.1, 2_240.9, 2_196.7, 2_196.5, 2_310.75],
    ),
    (
        "cardano", "ADA", "Cardano", 0.52, -1.3, 1000.0, 18_000_000_000.0, 800_000_000.0,
        [0.541, 0.538, 0.533, 0.529, 0.531, 0.527, 0.52],
    ),
    (
        "solana", "SOL", "Solana", 102.40, 3.8, 12.0, 42_000_000_000.0, 2_200_000_000.0,
        [96.2, 97.8, 99.1, 98.4, 100.6, 98.65, 102.4],
    ),
];

// (asset id, symbol, name, price, 24h change %, market cap, volume)
const SAMPLE_MARKET: &[(&str, &str, &str, f64, f64, f64, f64)] = &[
    ("bitcoin", "BTC", "Bitcoin", 45_230.50, 2.5, 880_000_000_000.0, 25_000_000_000.0),
    ("ethereum", "ETH", "Ethereum", 2_310.75, 5.2, 280_000_000_000.0, 15_000_000_000.0),
    ("cardano", "ADA", "Cardano", 0.52, -1.3, 18_000_000_000.0, 800_000_000.0),
    ("solana", "SOL", "Solana", 102.40, 3.8, 42_000_000_000.0, 2_200_000_000.0),
    ("ripple", "XRP", "XRP", 0.58, 1.2, 31_000_000_000.0, 1_800_000_000.0),
    ("polkadot", "DOT", "Polkadot", 7.25, -0.8, 9_000_000_000.0, 400_000_000.0),
];

// (year, month, day, value)
const SAMPLE_HISTORY: &[(i32, u32, u32, f64)] = &[
    (2025, 7, 18, 24_850.20),
    (2025, 7, 19, 25_100.75),
    (2025, 7, 20, 24_950.30),
    (2025, 7, 21, 25_200.80),
    (2025, 7, 22, 25_350.45),
    (2025, 7, 23, 25_120.60),
    (2025, 7, 24, 25_430.75),
];

/// Fixed sample portfolio shown whenever the feed cannot deliver.
///
/// Built once from literal data, without touching the network; every call
/// to [`FallbackPolicy::snapshot`] returns the same values.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    snapshot: PortfolioSnapshot,
    market: Vec<MarketCoin>,
    history: PerformanceHistory,
}

impl FallbackPolicy {
    pub fn new() -> Self {
        let holdings: Vec<Holding> = SAMPLE_HOLDINGS
            .iter()
            .map(|&(id, sym, name, _, _, qty, _, _, _)| Holding::new(id, sym, name, qty))
            .collect();
        let quotes: QuoteMap = SAMPLE_HOLDINGS
            .iter()
            .map(|&(id, sym, name, price, change, _, cap, vol, series)| {
                let quote = PriceQuote::new(id, price, change)
                    .with_market(cap, vol)
                    .with_sparkline(series.to_vec())
                    .with_identity(sym, name);
                (id.to_string(), quote)
            })
            .collect();

        // The sample rows are well-formed literals, so validation cannot fail.
        let config = HoldingConfig::new(holdings).unwrap_or_default();
        let as_of = DateTime::<Utc>::from_timestamp(SAMPLE_AS_OF_SECS, 0).unwrap_or_default();
        let snapshot = value_portfolio(&config, &quotes, None, as_of, SnapshotSource::Fallback);

        let market = SAMPLE_MARKET
            .iter()
            .map(|&(id, sym, name, price, change, cap, vol)| MarketCoin {
                asset_id: id.to_string(),
                name: name.to_string(),
                symbol: sym.to_string(),
                price_usd: price,
                change_24h_percent: change,
                market_cap_usd: cap,
                volume_usd: vol,
            })
            .collect();

        let history = PerformanceHistory::from_points(SAMPLE_HISTORY.iter().filter_map(
            |&(y, m, d, value_usd)| {
                NaiveDate::from_ymd_opt(y, m, d).map(|date| PerformancePoint { date, value_usd })
            },
        ));

        Self {
            snapshot,
            market,
            history,
        }
    }

    /// The sample portfolio snapshot.
    pub fn snapshot(&self) -> PortfolioSnapshot {
        self.snapshot.clone()
    }

    /// The sample market overview list.
    pub fn market(&self) -> &[MarketCoin] {
        &self.market
    }

    /// The sample performance history.
    pub fn history(&self) -> &PerformanceHistory {
        &self.history
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new()
    }
}
