use crate::models::chart::PerformanceHistory;
use crate::models::market::MarketCoin;
use crate::models::settings::Settings;
use crate::models::snapshot::{PortfolioSnapshot, ValuedAsset};
use crate::models::view::{
    AllocationSlice, ChangeClass, DashboardViewModel, HoldingRow, MarketCard, PerformanceSeries,
    SparkPoint,
};

/// Doughnut slice colours, cycled when there are more assets than colours.
pub const ALLOCATION_PALETTE: &[&str] = &[
    "#0ea5e9", "#8b5cf6", "#ec4899", "#f59e0b", "#10b981", "#ef4444",
];

/// Converts snapshots into render-ready strings and coordinates.
///
/// The core computes all the numbers and formats them; the renderer only
/// places them. Pure: the same snapshot always yields the same view model.
#[derive(Debug, Clone)]
pub struct PresentationService {
    sparkline_width: f64,
    sparkline_height: f64,
}

impl PresentationService {
    pub fn new(settings: &Settings) -> Self {
        Self::with_sparkline_box(settings.sparkline_width, settings.sparkline_height)
    }

    pub fn with_sparkline_box(width: f64, height: f64) -> Self {
        Self {
            sparkline_width: width,
            sparkline_height: height,
        }
    }

    /// The portfolio part of the dashboard: summary, holdings table and
    /// allocation chart. `performance` and `market` are left empty.
    pub fn to_view_model(&self, snapshot: &PortfolioSnapshot) -> DashboardViewModel {
        DashboardViewModel {
            total_value: format_usd(snapshot.total_value_usd),
            change_amount: format_usd(snapshot.aggregate_change_usd.abs()),
            change_percent: format_signed_percent(snapshot.aggregate_change_percent),
            change_class: ChangeClass::of(snapshot.aggregate_change_percent),
            as_of: snapshot.as_of,
            source: snapshot.source,
            holdings: snapshot.assets.iter().map(|a| self.holding_row(a)).collect(),
            allocation: allocation_slices(&snapshot.assets),
            performance: PerformanceSeries::default(),
            market: Vec::new(),
        }
    }

    /// Full dashboard: portfolio plus performance chart and market cards.
    pub fn render(
        &self,
        snapshot: &PortfolioSnapshot,
        history: &PerformanceHistory,
        market: &[MarketCoin],
    ) -> DashboardViewModel {
        let mut view = self.to_view_model(snapshot);
        view.performance = performance_series(history);
        view.market = market_cards(market);
        view
    }

    fn holding_row(&self, asset: &ValuedAsset) -> HoldingRow {
        HoldingRow {
            icon: asset.symbol.chars().next().map(String::from).unwrap_or_default(),
            name: asset.display_name.clone(),
            symbol: asset.symbol.clone(),
            price: format_usd(asset.unit_price_usd),
            change: format_signed_percent(asset.change_24h_percent),
            change_class: ChangeClass::of(asset.change_24h_percent),
            quantity: format_quantity(asset.quantity),
            value: format_usd(asset.value_usd),
            allocation: format!("{:.1}%", asset.allocation_percent),
            sparkline: self.sparkline(&asset.sparkline_7d),
        }
    }

    /// Min-max scale `series` into the sparkline box.
    ///
    /// x spreads evenly over the width; y is flipped so higher prices sit
    /// higher on screen. A flat series maps to the vertical centre.
    pub fn sparkline(&self, series: &[f64]) -> Vec<SparkPoint> {
        let (w, h) = (self.sparkline_width, self.sparkline_height);
        let step = if series.len() > 1 {
            w / (series.len() - 1) as f64
        } else {
            0.0
        };
        let min = series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;

        series
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let y = if span > 0.0 && span.is_finite() {
                    h - (v - min) / span * h
                } else {
                    h / 2.0
                };
                SparkPoint {
                    x: i as f64 * step,
                    y,
                }
            })
            .collect()
    }
}

fn allocation_slices(assets: &[ValuedAsset]) -> Vec<AllocationSlice> {
    assets
        .iter()
        .enumerate()
        .map(|(i, a)| AllocationSlice {
            label: a.symbol.clone(),
            percent: a.allocation_percent,
            color: ALLOCATION_PALETTE[i % ALLOCATION_PALETTE.len()].to_string(),
        })
        .collect()
}

/// Dates as `YYYY-MM-DD` labels with their values.
pub fn performance_series(history: &PerformanceHistory) -> PerformanceSeries {
    PerformanceSeries {
        labels: history
            .points()
            .iter()
            .map(|p| p.date.format("%Y-%m-%d").to_string())
            .collect(),
        values: history.points().iter().map(|p| p.value_usd).collect(),
    }
}

pub fn market_cards(coins: &[MarketCoin]) -> Vec<MarketCard> {
    coins
        .iter()
        .map(|c| MarketCard {
            symbol: c.symbol.clone(),
            name: c.name.clone(),
            price: format_usd(c.price_usd),
            change: format_signed_percent(c.change_24h_percent),
            change_class: ChangeClass::of(c.change_24h_percent),
            market_cap: format_billions(c.market_cap_usd),
            volume: format_billions(c.volume_usd),
        })
        .collect()
}

// ── Formatting helpers ──────────────────────────────────────────────

/// `$1,234.56`: two decimals, comma thousands grouping, `-$` for negatives.
pub fn format_usd(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    // "-0.00" would read oddly, so rounding to zero drops the sign.
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{frac_part}")
}

/// `+2.50%` for values `>= 0`, `-1.30%` otherwise.
pub fn format_signed_percent(value: f64) -> String {
    // -0.0 would print as "+-0.00%"
    let value = if value == 0.0 { 0.0 } else { value };
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.2}%")
}

/// `$880.00B`
pub fn format_billions(value: f64) -> String {
    format!("${:.2}B", value / 1_000_000_000.0)
}

/// Quantities print the way they were configured: `0.5`, `5`, `1000`.
pub fn format_quantity(quantity: f64) -> String {
    format!("{quantity}")
}
