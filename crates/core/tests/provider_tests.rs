// ═══════════════════════════════════════════════════════════════════
// Provider Tests: CoinGecko id resolution, URL building, parsing, fetch
// ═══════════════════════════════════════════════════════════════════

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use coinfolio_core::errors::CoreError;
use coinfolio_core::models::settings::{QuoteEndpoint, Settings};
use coinfolio_core::providers::coingecko::{
    markets_url, parse_markets, parse_simple_price, simple_price_url, symbol_for_id,
    CoinGeckoFeed, API_KEY_PARAM,
};
use coinfolio_core::providers::traits::PriceFeed;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn query_map(url: &reqwest::Url) -> HashMap<String, String> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn feed_for(base_url: &str, endpoint: QuoteEndpoint, api_key: Option<&str>) -> CoinGeckoFeed {
    CoinGeckoFeed::new(&Settings {
        feed_base_url: base_url.to_string(),
        quote_endpoint: endpoint,
        api_key: api_key.map(str::to_string),
        request_timeout_secs: 5,
        ..Settings::default()
    })
}

const MARKETS_BODY: &str = r#"[
    {
        "id": "bitcoin", "symbol": "btc", "name": "Bitcoin",
        "current_price": 45230.5, "price_change_percentage_24h": 2.5,
        "market_cap": 880000000000, "total_volume": 25000000000,
        "sparkline_in_7d": { "price": [43950.0, 44310.0, 45230.5] }
    },
    {
        "id": "ethereum", "symbol": "eth", "name": "Ethereum",
        "current_price": 2310.75, "price_change_percentage_24h": null,
        "market_cap": null, "total_volume": null, "sparkline_in_7d": null
    },
    {
        "id": "terra-luna-2", "symbol": "luna", "name": "Terra",
        "current_price": null, "price_change_percentage_24h": 1.0,
        "market_cap": 1, "total_volume": 1
    }
]"#;

// ═══════════════════════════════════════════════════════════════════
// Fake feed: answers exactly one request with a canned HTTP response
// ═══════════════════════════════════════════════════════════════════

async fn serve_once(status_line: &'static str, body: &'static str) -> (SocketAddr, Arc<Mutex<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(String::new()));
    let seen_in_task = seen.clone();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let request = String::from_utf8_lossy(&buf);
        let request_line = request.lines().next().unwrap_or_default().to_string();
        *seen_in_task.lock().unwrap() = request_line;

        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    (addr, seen)
}

// ═══════════════════════════════════════════════════════════════════
// Identifier resolution
// ═══════════════════════════════════════════════════════════════════

mod resolution {
    use super::*;

    #[test]
    fn known_symbols_map_to_ids() {
        let feed = feed_for("http://localhost", QuoteEndpoint::Markets, None);
        assert_eq!(feed.resolve_id("BTC").as_deref(), Some("bitcoin"));
        assert_eq!(feed.resolve_id("eth").as_deref(), Some("ethereum"));
        assert_eq!(feed.resolve_id(" AVAX ").as_deref(), Some("avalanche-2"));
    }

    #[test]
    fn plain_ids_pass_through_lowercased() {
        let feed = feed_for("http://localhost", QuoteEndpoint::Markets, None);
        assert_eq!(feed.resolve_id("shiba-inu").as_deref(), Some("shiba-inu"));
        assert_eq!(feed.resolve_id("Polkadot").as_deref(), Some("polkadot"));
    }

    #[test]
    fn rejects_unusable_identifiers() {
        let feed = feed_for("http://localhost", QuoteEndpoint::Markets, None);
        assert_eq!(feed.resolve_id(""), None);
        assert_eq!(feed.resolve_id("   "), None);
        assert_eq!(feed.resolve_id("not a coin"), None);
        assert_eq!(feed.resolve_id("btc&x=1"), None);
    }

    #[test]
    fn resolve_ids_dedupes_in_order() {
        let feed = feed_for("http://localhost", QuoteEndpoint::Markets, None);
        let resolved = feed.resolve_ids(&ids(&["cardano", "BTC", "bitcoin", "bad id", "ada"]));
        assert_eq!(resolved, ids(&["cardano", "bitcoin"]));
    }

    #[test]
    fn reverse_symbol_lookup() {
        assert_eq!(symbol_for_id("ripple"), Some("XRP"));
        assert_eq!(symbol_for_id("terra-luna-2"), Some("LUNA"));
        assert_eq!(symbol_for_id("unknown-coin"), None);
    }
}

// ═══════════════════════════════════════════════════════════════════
// URL building
// ═══════════════════════════════════════════════════════════════════

mod urls {
    use super::*;

    #[test]
    fn markets_url_parameters() {
        let url = markets_url(
            "https://api.coingecko.com/api/v3/",
            &ids(&["bitcoin", "ethereum"]),
            None,
        )
        .unwrap();
        assert_eq!(url.path(), "/api/v3/coins/markets");
        let q = query_map(&url);
        assert_eq!(q["vs_currency"], "usd");
        assert_eq!(q["ids"], "bitcoin,ethereum");
        assert_eq!(q["sparkline"], "true");
        assert_eq!(q["price_change_percentage"], "24h");
        assert!(!q.contains_key(API_KEY_PARAM));
    }

    #[test]
    fn simple_price_url_parameters() {
        let url = simple_price_url("http://localhost:8787/api", &ids(&["cardano"]), Some("k")).unwrap();
        assert_eq!(url.path(), "/api/simple/price");
        let q = query_map(&url);
        assert_eq!(q["ids"], "cardano");
        assert_eq!(q["vs_currencies"], "usd");
        assert_eq!(q["include_24hr_change"], "true");
        assert_eq!(q["include_market_cap"], "true");
        assert_eq!(q["include_24hr_vol"], "true");
        assert_eq!(q[API_KEY_PARAM], "k");
    }

    #[test]
    fn invalid_base_is_config_error() {
        let result = markets_url("not a url", &ids(&["bitcoin"]), None);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn feed_uses_configured_endpoint_and_key() {
        let feed = feed_for(
            "https://api.coingecko.com/api/v3",
            QuoteEndpoint::SimplePrice,
            Some("paid"),
        );
        assert_eq!(feed.endpoint(), QuoteEndpoint::SimplePrice);
        let url = feed.quotes_url(&ids(&["bitcoin"])).unwrap();
        assert!(url.path().ends_with("/simple/price"));
        assert_eq!(query_map(&url)[API_KEY_PARAM], "paid");
    }

    #[test]
    fn blank_key_is_not_sent() {
        let feed = feed_for("https://api.coingecko.com/api/v3", QuoteEndpoint::Markets, Some("  "));
        let url = feed.quotes_url(&ids(&["bitcoin"])).unwrap();
        assert!(!query_map(&url).contains_key(API_KEY_PARAM));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Response parsing
// ═══════════════════════════════════════════════════════════════════

mod parsing {
    use super::*;

    #[test]
    fn markets_response() {
        let quotes = parse_markets(MARKETS_BODY).unwrap();
        assert_eq!(quotes.len(), 2, "entry without a price is skipped");

        let btc = &quotes["bitcoin"];
        assert_eq!(btc.unit_price_usd, 45230.5);
        assert_eq!(btc.change_24h_percent, 2.5);
        assert_eq!(btc.market_cap_usd, Some(880_000_000_000.0));
        assert_eq!(btc.sparkline_7d.len(), 3);
        assert_eq!(btc.symbol.as_deref(), Some("BTC"));
        assert_eq!(btc.name.as_deref(), Some("Bitcoin"));

        let eth = &quotes["ethereum"];
        assert_eq!(eth.change_24h_percent, 0.0);
        assert!(eth.market_cap_usd.is_none());
        assert!(eth.sparkline_7d.is_empty());
    }

    #[test]
    fn markets_negative_price_is_skipped() {
        let body = r#"[{"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":-1.0}]"#;
        assert!(parse_markets(body).unwrap().is_empty());
    }

    #[test]
    fn simple_price_response() {
        let body = r#"{
            "bitcoin": {"usd": 45230.5, "usd_24h_change": -1.25, "usd_market_cap": 880000000000.0, "usd_24h_vol": 25000000000.0},
            "some-new-coin": {"usd": 0.01},
            "cardano": {}
        }"#;
        let quotes = parse_simple_price(body).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["bitcoin"].change_24h_percent, -1.25);
        assert_eq!(quotes["bitcoin"].symbol.as_deref(), Some("BTC"));
        assert_eq!(quotes["bitcoin"].volume_usd, Some(25_000_000_000.0));
        assert_eq!(quotes["some-new-coin"].symbol, None);
        assert_eq!(quotes["some-new-coin"].change_24h_percent, 0.0);
    }

    #[test]
    fn malformed_body_is_feed_unavailable() {
        for body in ["<html>rate limited</html>", "{\"bitcoin\": 3}", ""] {
            match parse_simple_price(body) {
                Err(CoreError::FeedUnavailable { status: None, message, .. }) => {
                    assert!(message.contains("malformed"))
                }
                other => panic!("Expected FeedUnavailable for {body:?}, got {:?}", other),
            }
        }
        assert!(matches!(
            parse_markets("{\"error\": \"x\"}"),
            Err(CoreError::FeedUnavailable { .. })
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// fetch_quotes
// ═══════════════════════════════════════════════════════════════════

mod fetching {
    use super::*;

    #[tokio::test]
    async fn empty_request_is_invalid() {
        let feed = feed_for("http://127.0.0.1:1", QuoteEndpoint::Markets, None);
        let result = feed.fetch_quotes(&[]).await;
        assert!(matches!(result, Err(CoreError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unresolvable_request_is_invalid() {
        let feed = feed_for("http://127.0.0.1:1", QuoteEndpoint::Markets, None);
        let result = feed.fetch_quotes(&ids(&["not a coin", "??"])).await;
        assert!(matches!(result, Err(CoreError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn fetches_markets_in_one_request() {
        let (addr, seen) = serve_once("200 OK", MARKETS_BODY).await;
        let feed = feed_for(&format!("http://{addr}/api"), QuoteEndpoint::Markets, None);

        let quotes = feed
            .fetch_quotes(&ids(&["BTC", "ethereum", "terra-luna-2"]))
            .await
            .unwrap();
        assert_eq!(quotes.len(), 2);

        let request_line = seen.lock().unwrap().clone();
        assert!(request_line.starts_with("GET /api/coins/markets?"), "{request_line}");
        assert!(request_line.contains("ids=bitcoin%2Cethereum%2Cterra-luna-2"), "{request_line}");
    }

    #[tokio::test]
    async fn error_status_is_feed_unavailable() {
        let (addr, _) = serve_once("429 Too Many Requests", "{\"status\":\"limited\"}").await;
        let feed = feed_for(&format!("http://{addr}"), QuoteEndpoint::SimplePrice, None);

        match feed.fetch_quotes(&ids(&["bitcoin"])).await {
            Err(CoreError::FeedUnavailable { status, .. }) => assert_eq!(status, Some(429)),
            other => panic!("Expected FeedUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_feed_unavailable() {
        let (addr, _) = serve_once("200 OK", "not json at all").await;
        let feed = feed_for(&format!("http://{addr}"), QuoteEndpoint::Markets, None);
        let err = feed.fetch_quotes(&ids(&["bitcoin"])).await.unwrap_err();
        assert!(matches!(err, CoreError::FeedUnavailable { .. }));
        assert!(err.is_feed_failure());
    }

    #[tokio::test]
    async fn unreachable_feed_does_not_leak_key() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let feed = feed_for(&format!("http://{addr}"), QuoteEndpoint::Markets, Some("secret-key"));
        let err = feed.fetch_quotes(&ids(&["bitcoin"])).await.unwrap_err();
        assert!(matches!(err, CoreError::FeedUnavailable { status: None, .. }));
        assert!(!err.to_string().contains("secret-key"), "leaked: {err}");
    }

    #[test]
    fn feed_name() {
        let feed = feed_for("http://localhost", QuoteEndpoint::Markets, None);
        assert_eq!(feed.name(), "CoinGecko");
    }
}
