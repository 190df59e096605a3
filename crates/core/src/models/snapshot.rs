use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a snapshot's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Computed from a successful feed response
    Live,
    /// The literal sample portfolio used while the feed is down
    Fallback,
}

/// A single holding after valuation.
///
/// `value_usd == unit_price_usd * quantity` always holds, and
/// `allocation_percent` is relative to the snapshot's own total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedAsset {
    pub asset_id: String,
    pub symbol: String,
    pub display_name: String,
    pub unit_price_usd: f64,
    pub change_24h_percent: f64,
    pub quantity: f64,
    pub value_usd: f64,

    /// Share of the portfolio total, 0–100
    pub allocation_percent: f64,

    /// 7-day price series carried through for sparkline rendering
    #[serde(default)]
    pub sparkline_7d: Vec<f64>,
}

/// The complete computed portfolio state for one refresh cycle.
///
/// Replaced wholesale every cycle, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Sum of all `ValuedAsset::value_usd`
    pub total_value_usd: f64,

    /// Σ value × (change% / 100)
    pub aggregate_change_usd: f64,

    /// Change relative to the implied value 24h ago (`total - change`)
    pub aggregate_change_percent: f64,

    /// Valued holdings in configuration order
    pub assets: Vec<ValuedAsset>,

    pub as_of: DateTime<Utc>,

    pub source: SnapshotSource,
}

impl PortfolioSnapshot {
    /// Look up a valued asset by feed identifier.
    pub fn asset(&self, asset_id: &str) -> Option<&ValuedAsset> {
        self.assets.iter().find(|a| a.asset_id == asset_id)
    }

    /// Look up a valued asset by ticker symbol (case-insensitive).
    pub fn asset_by_symbol(&self, symbol: &str) -> Option<&ValuedAsset> {
        let upper = symbol.to_uppercase();
        self.assets.iter().find(|a| a.symbol == upper)
    }

    pub fn is_fallback(&self) -> bool {
        self.source == SnapshotSource::Fallback
    }
}
