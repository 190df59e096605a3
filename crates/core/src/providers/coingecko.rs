use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::traits::PriceFeed;
use crate::errors::CoreError;
use crate::models::quote::{PriceQuote, QuoteMap};
use crate::models::settings::{QuoteEndpoint, Settings};

const PROVIDER: &str = "CoinGecko";

/// Query parameter carrying the paid-tier key.
pub const API_KEY_PARAM: &str = "x_cg_pro_api_key";

/// Ticker symbol → CoinGecko id for the coins the dashboard knows by name.
const KNOWN_SYMBOLS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("DOT", "polkadot"),
    ("DOGE", "dogecoin"),
    ("SHIB", "shiba-inu"),
    ("LUNA", "terra-luna-2"),
    ("AVAX", "avalanche-2"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("BNB", "binancecoin"),
    ("LTC", "litecoin"),
    ("LINK", "chainlink"),
    ("MATIC", "matic-network"),
    ("TRX", "tron"),
    ("XLM", "stellar"),
    ("ATOM", "cosmos"),
    ("UNI", "uniswap"),
];

/// Reverse lookup: CoinGecko id → ticker symbol, for known coins.
pub fn symbol_for_id(asset_id: &str) -> Option<&'static str> {
    KNOWN_SYMBOLS
        .iter()
        .find(|(_, id)| *id == asset_id)
        .map(|(sym, _)| *sym)
}

/// CoinGecko market-data feed.
///
/// - **Free tier**: no API key required; a key switches on the paid tier.
/// - **Endpoints**: `/coins/markets` (default) or `/simple/price`.
/// - **Batching**: every call asks for all identifiers at once. No retry,
///   no caching: one request per refresh cycle.
///
/// `base_url` may point at the public API or at a proxy that forwards to it.
pub struct CoinGeckoFeed {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    endpoint: QuoteEndpoint,
    symbol_map: HashMap<String, String>,
}

impl CoinGeckoFeed {
    pub fn new(settings: &Settings) -> Self {
        let symbol_map = KNOWN_SYMBOLS
            .iter()
            .map(|(sym, id)| (sym.to_string(), id.to_string()))
            .collect();

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(settings.request_timeout());
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: settings.feed_base_url.trim_end_matches('/').to_string(),
            api_key: settings.effective_api_key().map(str::to_string),
            endpoint: settings.quote_endpoint,
            symbol_map,
        }
    }

    pub fn endpoint(&self) -> QuoteEndpoint {
        self.endpoint
    }

    /// Resolve and de-duplicate identifiers, preserving first-seen order.
    pub fn resolve_ids(&self, identifiers: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for identifier in identifiers {
            match self.resolve_id(identifier) {
                Some(id) => {
                    if seen.insert(id.clone()) {
                        ids.push(id);
                    }
                }
                None => warn!(provider = PROVIDER, identifier = %identifier, "Dropping unresolvable identifier"),
            }
        }
        ids
    }

    /// Build the single request URL for `ids` on the configured endpoint.
    pub fn quotes_url(&self, ids: &[String]) -> Result<Url, CoreError> {
        match self.endpoint {
            QuoteEndpoint::Markets => markets_url(&self.base_url, ids, self.api_key.as_deref()),
            QuoteEndpoint::SimplePrice => {
                simple_price_url(&self.base_url, ids, self.api_key.as_deref())
            }
        }
    }
}

// ── URL builders ────────────────────────────────────────────────────

fn endpoint_url(base_url: &str, path: &str) -> Result<Url, CoreError> {
    let raw = format!("{}/{path}", base_url.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| CoreError::Config(format!("invalid feed URL '{base_url}': {e}")))
}

/// `GET <base>/coins/markets?vs_currency=usd&ids=<csv>&...&sparkline=true`
pub fn markets_url(base_url: &str, ids: &[String], api_key: Option<&str>) -> Result<Url, CoreError> {
    let mut url = endpoint_url(base_url, "coins/markets")?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("vs_currency", "usd")
            .append_pair("ids", &ids.join(","))
            .append_pair("order", "market_cap_desc")
            .append_pair("per_page", "250")
            .append_pair("page", "1")
            .append_pair("sparkline", "true")
            .append_pair("price_change_percentage", "24h");
        if let Some(key) = api_key {
            q.append_pair(API_KEY_PARAM, key);
        }
    }
    Ok(url)
}

/// `GET <base>/simple/price?ids=<csv>&vs_currencies=usd&include_24hr_change=true&...`
pub fn simple_price_url(
    base_url: &str,
    ids: &[String],
    api_key: Option<&str>,
) -> Result<Url, CoreError> {
    let mut url = endpoint_url(base_url, "simple/price")?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("ids", &ids.join(","))
            .append_pair("vs_currencies", "usd")
            .append_pair("include_24hr_change", "true")
            .append_pair("include_market_cap", "true")
            .append_pair("include_24hr_vol", "true");
        if let Some(key) = api_key {
            q.append_pair(API_KEY_PARAM, key);
        }
    }
    Ok(url)
}

// ── CoinGecko response types ────────────────────────────────────────

#[derive(Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    sparkline_in_7d: Option<SparklineData>,
}

#[derive(Deserialize)]
struct SparklineData {
    #[serde(default)]
    price: Vec<f64>,
}

#[derive(Deserialize)]
struct SimplePriceEntry {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_vol: Option<f64>,
}

fn malformed(e: serde_json::Error) -> CoreError {
    CoreError::FeedUnavailable {
        provider: PROVIDER.into(),
        status: None,
        message: format!("malformed response: {e}"),
    }
}

fn usable_price(asset_id: &str, price: Option<f64>) -> Option<f64> {
    match price {
        Some(p) if p.is_finite() && p >= 0.0 => Some(p),
        Some(p) => {
            warn!(provider = PROVIDER, asset_id, price = p, "Ignoring invalid price");
            None
        }
        None => None,
    }
}

/// Parse a `/coins/markets` array. Entries without a usable price are left
/// out so the valuation treats them as missing quotes.
pub fn parse_markets(body: &str) -> Result<QuoteMap, CoreError> {
    let entries: Vec<MarketEntry> = serde_json::from_str(body).map_err(malformed)?;
    let mut quotes = QuoteMap::with_capacity(entries.len());
    for entry in entries {
        let Some(price) = usable_price(&entry.id, entry.current_price) else {
            continue;
        };
        let quote = PriceQuote {
            asset_id: entry.id.clone(),
            unit_price_usd: price,
            change_24h_percent: entry.price_change_percentage_24h.unwrap_or(0.0),
            market_cap_usd: entry.market_cap,
            volume_usd: entry.total_volume,
            sparkline_7d: entry.sparkline_in_7d.map(|s| s.price).unwrap_or_default(),
            symbol: Some(entry.symbol.to_uppercase()),
            name: Some(entry.name),
        };
        quotes.insert(entry.id, quote);
    }
    Ok(quotes)
}

/// Parse a `/simple/price` object keyed by asset id.
pub fn parse_simple_price(body: &str) -> Result<QuoteMap, CoreError> {
    let entries: HashMap<String, SimplePriceEntry> = serde_json::from_str(body).map_err(malformed)?;
    let mut quotes = QuoteMap::with_capacity(entries.len());
    for (id, entry) in entries {
        let Some(price) = usable_price(&id, entry.usd) else {
            continue;
        };
        let mut quote = PriceQuote::new(id.clone(), price, entry.usd_24h_change.unwrap_or(0.0));
        quote.market_cap_usd = entry.usd_market_cap;
        quote.volume_usd = entry.usd_24h_vol;
        quote.symbol = symbol_for_id(&id).map(str::to_string);
        quotes.insert(id, quote);
    }
    Ok(quotes)
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceFeed for CoinGeckoFeed {
    fn name(&self) -> &str {
        PROVIDER
    }

    /// Known ticker symbols ("BTC") map through the static table; anything
    /// else is accepted as an id if it is lowercase alphanumerics and `-`.
    fn resolve_id(&self, identifier: &str) -> Option<String> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(id) = self.symbol_map.get(&trimmed.to_uppercase()) {
            return Some(id.clone());
        }
        let lower = trimmed.to_lowercase();
        lower
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            .then_some(lower)
    }

    async fn fetch_quotes(&self, asset_ids: &[String]) -> Result<QuoteMap, CoreError> {
        if asset_ids.is_empty() {
            return Err(CoreError::InvalidRequest("no asset identifiers requested".into()));
        }
        let ids = self.resolve_ids(asset_ids);
        if ids.is_empty() {
            return Err(CoreError::InvalidRequest(format!(
                "none of {asset_ids:?} resolve to a {PROVIDER} id"
            )));
        }

        let url = self.quotes_url(&ids)?;
        debug!(
            provider = PROVIDER,
            path = url.path(),
            assets = ids.len(),
            "Requesting quotes"
        );

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::FeedUnavailable {
                provider: PROVIDER.into(),
                status: None,
                message: CoreError::from(e).to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::FeedUnavailable {
                provider: PROVIDER.into(),
                status: Some(status.as_u16()),
                message: format!("request failed with status {status}"),
            });
        }

        let body = resp.text().await.map_err(|e| CoreError::FeedUnavailable {
            provider: PROVIDER.into(),
            status: Some(status.as_u16()),
            message: CoreError::from(e).to_string(),
        })?;

        let quotes = match self.endpoint {
            QuoteEndpoint::Markets => parse_markets(&body)?,
            QuoteEndpoint::SimplePrice => parse_simple_price(&body)?,
        };
        debug!(provider = PROVIDER, received = quotes.len(), "Quotes received");
        Ok(quotes)
    }
}
