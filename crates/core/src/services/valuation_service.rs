use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::CoreError;
use crate::models::holding::{Holding, HoldingConfig};
use crate::models::quote::QuoteMap;
use crate::models::snapshot::{PortfolioSnapshot, SnapshotSource, ValuedAsset};

/// Turns holdings + quotes into a portfolio snapshot.
///
/// The only state kept between cycles is the last snapshot this engine
/// produced, used when the feed omits a quote for a configured asset:
/// the asset keeps its previous price (or values at zero if it never had one).
#[derive(Debug, Default)]
pub struct ValuationEngine {
    previous: Option<PortfolioSnapshot>,
}

impl ValuationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value the portfolio as of now.
    pub fn compute_snapshot(&mut self, config: &HoldingConfig, quotes: &QuoteMap) -> PortfolioSnapshot {
        self.compute_snapshot_at(config, quotes, Utc::now())
    }

    /// Value the portfolio with an explicit timestamp, then remember the
    /// result for the next cycle's missing-quote lookups.
    pub fn compute_snapshot_at(
        &mut self,
        config: &HoldingConfig,
        quotes: &QuoteMap,
        as_of: DateTime<Utc>,
    ) -> PortfolioSnapshot {
        let snapshot = value_portfolio(
            config,
            quotes,
            self.previous.as_ref(),
            as_of,
            SnapshotSource::Live,
        );
        self.previous = Some(snapshot.clone());
        snapshot
    }

    /// The last snapshot computed by this engine, if any.
    pub fn previous(&self) -> Option<&PortfolioSnapshot> {
        self.previous.as_ref()
    }
}

/// Pure valuation of `config` against `quotes`.
///
/// 1. Value each holding: `value = price × quantity` (quote, else previous
///    entry's price, else zero)
/// 2. Sum the total bottom-up
/// 3. Allocation per asset against that total
/// 4. Aggregate 24h change and its percentage against the implied
///    value 24h ago (`total - change`)
pub fn value_portfolio(
    config: &HoldingConfig,
    quotes: &QuoteMap,
    previous: Option<&PortfolioSnapshot>,
    as_of: DateTime<Utc>,
    source: SnapshotSource,
) -> PortfolioSnapshot {
    // 1. Value per asset
    let mut assets: Vec<ValuedAsset> = config
        .iter()
        .map(|holding| value_holding(holding, quotes, previous))
        .collect();

    // 2. Total
    let total_value_usd: f64 = assets.iter().map(|a| a.value_usd).sum();

    // 3. Allocation
    for asset in &mut assets {
        asset.allocation_percent =
            ratio(asset.value_usd, total_value_usd, "allocation").map_or(0.0, |r| r * 100.0);
    }

    // 4. Aggregate change
    let aggregate_change_usd: f64 = assets
        .iter()
        .map(|a| a.value_usd * (a.change_24h_percent / 100.0))
        .sum();
    let aggregate_change_percent = ratio(
        aggregate_change_usd,
        total_value_usd - aggregate_change_usd,
        "aggregate change",
    )
    .map_or(0.0, |r| r * 100.0);

    PortfolioSnapshot {
        total_value_usd,
        aggregate_change_usd,
        aggregate_change_percent,
        assets,
        as_of,
        source,
    }
}

fn value_holding(holding: &Holding, quotes: &QuoteMap, previous: Option<&PortfolioSnapshot>) -> ValuedAsset {
    let (price, change, sparkline) = match quotes.get(&holding.asset_id) {
        Some(q) => (q.unit_price_usd, q.change_24h_percent, q.sparkline_7d.clone()),
        None => match previous.and_then(|p| p.asset(&holding.asset_id)) {
            Some(prev) => {
                debug!(asset_id = %holding.asset_id, "No quote this cycle, reusing previous price");
                (prev.unit_price_usd, prev.change_24h_percent, prev.sparkline_7d.clone())
            }
            None => {
                debug!(asset_id = %holding.asset_id, "No quote and no previous entry, valuing at zero");
                (0.0, 0.0, Vec::new())
            }
        },
    };

    ValuedAsset {
        asset_id: holding.asset_id.clone(),
        symbol: holding.symbol.clone(),
        display_name: holding.display_name.clone(),
        unit_price_usd: price,
        change_24h_percent: change,
        quantity: holding.quantity,
        value_usd: price * holding.quantity,
        allocation_percent: 0.0, // filled once the total is known
        sparkline_7d: sparkline,
    }
}

/// `numerator / denominator`, or `ComputationDegenerate` when the
/// denominator is zero or the result is not finite. Callers resolve the
/// error to a 0 default, it never leaves this module.
fn ratio(numerator: f64, denominator: f64, what: &str) -> Result<f64, CoreError> {
    if denominator == 0.0 || !denominator.is_finite() {
        return Err(CoreError::ComputationDegenerate(format!(
            "{what}: denominator is {denominator}"
        )));
    }
    let r = numerator / denominator;
    if !r.is_finite() {
        return Err(CoreError::ComputationDegenerate(format!("{what}: result is {r}")));
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_rejects_zero_denominator() {
        match ratio(1.0, 0.0, "x") {
            Err(CoreError::ComputationDegenerate(msg)) => assert!(msg.contains("x")),
            other => panic!("Expected ComputationDegenerate, got {:?}", other),
        }
    }

    #[test]
    fn ratio_rejects_infinite_denominator() {
        assert!(ratio(1.0, f64::INFINITY, "x").is_err());
    }

    #[test]
    fn ratio_divides() {
        assert_eq!(ratio(1.0, 4.0, "x").unwrap(), 0.25);
    }
}
