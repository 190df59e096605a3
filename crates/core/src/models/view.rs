use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::SnapshotSource;

/// Sign classification of a change value; `>= 0` is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeClass {
    Positive,
    Negative,
}

impl ChangeClass {
    pub fn of(value: f64) -> Self {
        if value >= 0.0 {
            ChangeClass::Positive
        } else {
            ChangeClass::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeClass::Positive => "positive",
            ChangeClass::Negative => "negative",
        }
    }
}

impl std::fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sparkline vertex in pixel space (origin top-left, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparkPoint {
    pub x: f64,
    pub y: f64,
}

/// One row of the holdings table, every field ready to print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    /// First character of the symbol, used as a placeholder icon
    pub icon: String,
    pub name: String,
    pub symbol: String,
    pub price: String,
    pub change: String,
    pub change_class: ChangeClass,
    pub quantity: String,
    pub value: String,
    pub allocation: String,
    pub sparkline: Vec<SparkPoint>,
}

/// One slice of the allocation doughnut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub label: String,
    pub percent: f64,
    pub color: String,
}

/// Performance line chart data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSeries {
    /// `YYYY-MM-DD` dates
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// One card in the market overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCard {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub change: String,
    pub change_class: ChangeClass,
    /// Market cap in billions, e.g. `$880.00B`
    pub market_cap: String,
    /// 24h volume in billions
    pub volume: String,
}

/// Everything an external renderer needs to draw the dashboard.
///
/// The core computes and formats; the renderer only places strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardViewModel {
    pub total_value: String,

    /// Absolute 24h change amount (the sign lives in `change_class`)
    pub change_amount: String,
    pub change_percent: String,
    pub change_class: ChangeClass,

    pub as_of: DateTime<Utc>,
    pub source: SnapshotSource,

    pub holdings: Vec<HoldingRow>,
    pub allocation: Vec<AllocationSlice>,

    #[serde(default)]
    pub performance: PerformanceSeries,

    #[serde(default)]
    pub market: Vec<MarketCard>,
}
