use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::errors::CoreError;

/// One configured position: how much of which coin the portfolio holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Feed identifier (e.g., "bitcoin", "ethereum")
    pub asset_id: String,

    /// Ticker symbol, uppercased (e.g., "BTC")
    pub symbol: String,

    /// Human-readable name (e.g., "Bitcoin")
    pub display_name: String,

    /// Units held (never negative)
    pub quantity: f64,
}

impl Holding {
    pub fn new(
        asset_id: impl Into<String>,
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        quantity: f64,
    ) -> Self {
        Self {
            asset_id: asset_id.into().trim().to_lowercase(),
            symbol: symbol.into().trim().to_uppercase(),
            display_name: display_name.into(),
            quantity,
        }
    }
}

/// The static, read-only list of holdings the dashboard values every cycle.
///
/// Built once at process start. Cloning is cheap (shared `Arc`), and there
/// is no way to mutate it after construction: order is the display order.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingConfig {
    holdings: Arc<[Holding]>,
}

impl HoldingConfig {
    /// Validate and freeze a list of holdings.
    ///
    /// Rejects blank ids/symbols, negative or non-finite quantities and
    /// duplicate asset ids.
    pub fn new(holdings: Vec<Holding>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for h in &holdings {
            if h.asset_id.is_empty() {
                return Err(CoreError::InvalidHolding(format!(
                    "holding '{}' has an empty asset id",
                    h.symbol
                )));
            }
            if h.symbol.is_empty() {
                return Err(CoreError::InvalidHolding(format!(
                    "holding '{}' has an empty symbol",
                    h.asset_id
                )));
            }
            if !h.quantity.is_finite() || h.quantity < 0.0 {
                return Err(CoreError::InvalidHolding(format!(
                    "quantity for {} must be finite and non-negative, got {}",
                    h.symbol, h.quantity
                )));
            }
            if !seen.insert(h.asset_id.as_str()) {
                return Err(CoreError::InvalidHolding(format!(
                    "duplicate asset id '{}'",
                    h.asset_id
                )));
            }
        }
        Ok(Self {
            holdings: holdings.into(),
        })
    }

    /// Parse a JSON array of holdings, e.g.
    /// `[{"asset_id":"bitcoin","symbol":"BTC","display_name":"Bitcoin","quantity":0.5}]`.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let raw: Vec<Holding> = serde_json::from_str(json)?;
        let normalized = raw
            .into_iter()
            .map(|h| Holding::new(h.asset_id, h.symbol, h.display_name, h.quantity))
            .collect();
        Self::new(normalized)
    }

    /// Load holdings from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.iter()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Feed identifiers in configuration order.
    pub fn asset_ids(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.asset_id.clone()).collect()
    }

    /// Rewrite every asset id into the feed's canonical form, so that a
    /// holding configured as "BTC" is keyed like the quotes ("bitcoin").
    /// An id the feed cannot resolve is an invalid holding, and two holdings
    /// resolving to the same id are duplicates.
    pub fn canonicalize(
        &self,
        resolve: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CoreError> {
        let holdings = self
            .holdings
            .iter()
            .map(|h| {
                let id = resolve(&h.asset_id).ok_or_else(|| {
                    CoreError::InvalidHolding(format!(
                        "asset id '{}' is not known to the price feed",
                        h.asset_id
                    ))
                })?;
                Ok(Holding {
                    asset_id: id,
                    ..h.clone()
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Self::new(holdings)
    }
}

impl Default for HoldingConfig {
    /// The dashboard's stock portfolio: 0.5 BTC, 5 ETH, 1000 ADA.
    fn default() -> Self {
        Self {
            holdings: vec![
                Holding::new("bitcoin", "BTC", "Bitcoin", 0.5),
                Holding::new("ethereum", "ETH", "Ethereum", 5.0),
                Holding::new("cardano", "ADA", "Cardano", 1000.0),
            ]
            .into(),
        }
    }
}
