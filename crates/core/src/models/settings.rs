use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

pub const DEFAULT_FEED_URL: &str = "https://api.coingecko.com/api/v3";

/// Environment variable holding the optional paid-tier API key.
pub const API_KEY_ENV: &str = "COINGECKO_API_KEY";
pub const FEED_URL_ENV: &str = "COINFOLIO_FEED_URL";
pub const REFRESH_SECS_ENV: &str = "COINFOLIO_REFRESH_SECS";

/// Which feed endpoint answers `fetch_quotes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEndpoint {
    /// `/coins/markets`: price, change, cap, volume, name and sparkline
    #[default]
    Markets,
    /// `/simple/price`: price, change, cap and volume only
    SimplePrice,
}

/// Runtime configuration for the dashboard pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the feed, or of a proxy that forwards to it
    pub feed_base_url: String,

    /// Optional paid-tier key, appended as a query parameter
    pub api_key: Option<String>,

    pub quote_endpoint: QuoteEndpoint,

    /// Seconds between timer-driven refresh cycles
    pub refresh_interval_secs: u64,

    /// Seconds a user-visible notice stays up before it auto-clears
    pub notice_duration_secs: u64,

    /// Upper bound on a single feed request
    pub request_timeout_secs: u64,

    /// Sparkline box in pixels
    pub sparkline_width: f64,
    pub sparkline_height: f64,

    /// Coins listed in the market overview, in feed identifiers
    pub market_ids: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_base_url: DEFAULT_FEED_URL.to_string(),
            api_key: None,
            quote_endpoint: QuoteEndpoint::Markets,
            refresh_interval_secs: 60,
            notice_duration_secs: 5,
            request_timeout_secs: 30,
            sparkline_width: 100.0,
            sparkline_height: 30.0,
            market_ids: [
                "bitcoin", "ethereum", "cardano", "solana", "ripple", "polkadot", "dogecoin",
                "shiba-inu", "terra-luna-2", "avalanche-2",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with `COINGECKO_API_KEY`, `COINFOLIO_FEED_URL`
    /// and `COINFOLIO_REFRESH_SECS` when set.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key → value lookup (the environment in production).
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        if let Some(key) = lookup(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(FEED_URL_ENV) {
            self.feed_base_url = url;
        }
        if let Some(secs) = lookup(REFRESH_SECS_ENV) {
            self.refresh_interval_secs = secs.trim().parse().map_err(|e| {
                CoreError::Config(format!("{REFRESH_SECS_ENV} must be a whole number of seconds: {e}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.feed_base_url.trim().is_empty() {
            return Err(CoreError::Config("feed base URL is empty".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(CoreError::Config("refresh interval must be at least 1 second".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config("request timeout must be at least 1 second".into()));
        }
        if !(self.sparkline_width > 0.0 && self.sparkline_height > 0.0) {
            return Err(CoreError::Config(format!(
                "sparkline box must be positive, got {}x{}",
                self.sparkline_width, self.sparkline_height
            )));
        }
        Ok(())
    }

    /// The API key, with blank values treated as absent.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_secs(self.notice_duration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
