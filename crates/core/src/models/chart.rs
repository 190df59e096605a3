use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Total portfolio value on one day, for the performance chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub value_usd: f64,
}

/// Daily portfolio values, kept sorted by date with at most one point per day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    points: Vec<PerformancePoint>,
}

impl PerformanceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary points; later duplicates of a date win.
    pub fn from_points(points: impl IntoIterator<Item = PerformancePoint>) -> Self {
        let mut history = Self::new();
        for p in points {
            history.record(p.date, p.value_usd);
        }
        history
    }

    /// Insert or overwrite the value for `date`.
    /// Binary search keeps the series sorted (O(log n) lookup).
    pub fn record(&mut self, date: NaiveDate, value_usd: f64) {
        match self.points.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => self.points[idx].value_usd = value_usd,
            Err(idx) => self.points.insert(idx, PerformancePoint { date, value_usd }),
        }
    }

    pub fn points(&self) -> &[PerformancePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&PerformancePoint> {
        self.points.last()
    }
}
