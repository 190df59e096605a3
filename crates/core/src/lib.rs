pub mod errors;
pub mod models;
pub mod providers;
pub mod services;

use models::{
    chart::PerformanceHistory, holding::HoldingConfig, market::MarketCoin,
    settings::Settings, snapshot::PortfolioSnapshot, view::DashboardViewModel,
};
use providers::{coingecko::CoinGeckoFeed, traits::PriceFeed};
use services::{
    fallback_service::FallbackPolicy, market_service::MarketService,
    presentation_service::PresentationService, valuation_service::ValuationEngine,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use errors::CoreError;

/// Everything one refresh cycle produces for the renderer.
#[derive(Debug, Clone)]
pub struct CycleData {
    pub snapshot: PortfolioSnapshot,
    pub market: Vec<MarketCoin>,
    pub view: DashboardViewModel,
}

/// Main entry point for the coinfolio core library.
/// Holds the configuration and all services one refresh cycle runs through:
/// feed → valuation (→ fallback on failure) → presentation.
#[must_use]
pub struct PortfolioDashboard {
    settings: Settings,
    holdings: HoldingConfig,
    feed: Arc<dyn PriceFeed>,
    valuation: ValuationEngine,
    fallback: FallbackPolicy,
    presenter: PresentationService,
    market_service: MarketService,
    history: PerformanceHistory,
}

impl std::fmt::Debug for PortfolioDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioDashboard")
            .field("feed", &self.feed.name())
            .field("holdings", &self.holdings.len())
            .field("history_points", &self.history.len())
            .finish()
    }
}

impl PortfolioDashboard {
    /// Wire a dashboard around any feed. Settings are validated first.
    ///
    /// Holding and market ids are rewritten once into the feed's canonical
    /// form, since quotes come back keyed that way. A holding the feed
    /// cannot resolve is rejected; an unresolvable market id is dropped.
    pub fn new(
        mut settings: Settings,
        holdings: HoldingConfig,
        feed: Arc<dyn PriceFeed>,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        let holdings = holdings.canonicalize(|id| feed.resolve_id(id))?;
        settings.market_ids = canonical_market_ids(feed.as_ref(), &settings.market_ids);
        let fallback = FallbackPolicy::new();
        // The performance chart starts from the sample series; live cycles
        // add or overwrite the point for their own day.
        let history = fallback.history().clone();
        Ok(Self {
            presenter: PresentationService::new(&settings),
            settings,
            holdings,
            feed,
            valuation: ValuationEngine::new(),
            fallback,
            market_service: MarketService::new(),
            history,
        })
    }

    /// A dashboard backed by the CoinGecko feed (direct or via proxy,
    /// depending on `settings.feed_base_url`).
    pub fn with_coingecko(settings: Settings, holdings: HoldingConfig) -> Result<Self, CoreError> {
        let feed = Arc::new(CoinGeckoFeed::new(&settings));
        Self::new(settings, holdings, feed)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn holdings(&self) -> &HoldingConfig {
        &self.holdings
    }

    pub fn history(&self) -> &PerformanceHistory {
        &self.history
    }

    /// Holding ids followed by market-overview ids, without duplicates.
    /// One feed call per cycle covers all of them.
    pub fn request_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.holdings
            .asset_ids()
            .into_iter()
            .chain(self.settings.market_ids.iter().cloned())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// Run one live cycle: fetch, value, record history, present.
    ///
    /// Errors are returned untouched; turning them into the degraded state
    /// is the scheduler's job.
    pub async fn refresh(&mut self) -> Result<CycleData, CoreError> {
        let ids = self.request_ids();
        let quotes = self.feed.fetch_quotes(&ids).await?;

        let snapshot = self.valuation.compute_snapshot(&self.holdings, &quotes);
        self.history
            .record(snapshot.as_of.date_naive(), snapshot.total_value_usd);
        let market = self.market_service.overview(&self.settings.market_ids, &quotes);
        let view = self.presenter.render(&snapshot, &self.history, &market);

        Ok(CycleData {
            snapshot,
            market,
            view,
        })
    }

    /// The sample dashboard shown while the feed is down.
    pub fn fallback(&self) -> CycleData {
        let snapshot = self.fallback.snapshot();
        let market = self.fallback.market().to_vec();
        let view = self
            .presenter
            .render(&snapshot, self.fallback.history(), &market);
        CycleData {
            snapshot,
            market,
            view,
        }
    }

    /// Filter market coins by symbol or name.
    pub fn search_market<'a>(&self, coins: &'a [MarketCoin], term: &str) -> Vec<&'a MarketCoin> {
        self.market_service.search(coins, term)
    }
}

fn canonical_market_ids(feed: &dyn PriceFeed, market_ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for identifier in market_ids {
        match feed.resolve_id(identifier) {
            Some(id) => {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
            None => warn!(feed = feed.name(), identifier = %identifier, "Dropping unresolvable market id"),
        }
    }
    ids
}
