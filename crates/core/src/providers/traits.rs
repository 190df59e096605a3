use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::QuoteMap;

/// Trait abstraction for market-data feeds.
///
/// The refresh pipeline only sees this trait, so the live CoinGecko client,
/// a proxied one, or a test double are interchangeable.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PriceFeed: Send + Sync {
    /// Human-readable name of this feed (for logs/errors).
    fn name(&self) -> &str;

    /// Canonical feed identifier for `identifier`, or `None` if this feed
    /// cannot quote it. Quote maps are keyed by the canonical form.
    fn resolve_id(&self, identifier: &str) -> Option<String> {
        let id = identifier.trim().to_lowercase();
        (!id.is_empty()).then_some(id)
    }

    /// Fetch current quotes for all `asset_ids` in one request.
    ///
    /// Fails with `InvalidRequest` when nothing in `asset_ids` can be
    /// resolved, and with `FeedUnavailable` / `Network` / `Deserialization`
    /// when the feed cannot deliver.
    async fn fetch_quotes(&self, asset_ids: &[String]) -> Result<QuoteMap, CoreError>;
}
