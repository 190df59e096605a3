use axum::{
    extract::State,
    http::{
        header::{ALLOW, CONTENT_TYPE},
        HeaderValue, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Router,
};
use reqwest::{Client, Url};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use coinfolio_core::errors::{redact_query, CoreError};
use coinfolio_core::models::settings::DEFAULT_FEED_URL;
use coinfolio_core::providers::coingecko::API_KEY_PARAM;

/// How the proxy reaches the feed.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream API root, e.g. `https://api.coingecko.com/api/v3`
    pub upstream_base: String,

    /// Path prefix stripped from incoming requests, e.g. `/api`
    pub path_prefix: String,

    /// Appended as `x_cg_pro_api_key` when set and non-blank
    pub api_key: Option<String>,

    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_base: DEFAULT_FEED_URL.to_string(),
            path_prefix: "/api".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<ProxyConfig>,
    client: Client,
}

/// Build the proxy router: every GET is forwarded upstream, other methods
/// get 405.
///
/// Cross-origin access is unrestricted since the caller is a browser page
/// served from a different origin than the feed.
pub fn router(config: ProxyConfig) -> Router {
    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .unwrap_or_else(|_| Client::new());
    let state = AppState {
        config: Arc::new(config),
        client,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new().fallback(forward).with_state(state).layer(cors)
}

/// Strip the configured prefix (if present) and rebuild the upstream URL,
/// keeping the incoming query string verbatim.
pub fn upstream_url(config: &ProxyConfig, uri: &Uri) -> Result<Url, CoreError> {
    let prefix = config.path_prefix.trim_end_matches('/');
    let path = uri.path();
    let stripped = match path.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path,
    };

    let mut raw = format!("{}{}", config.upstream_base.trim_end_matches('/'), stripped);
    if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
        raw.push('?');
        raw.push_str(query);
    }

    let mut url = Url::parse(&raw)
        .map_err(|e| CoreError::Config(format!("invalid upstream URL: {e}")))?;
    let key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());
    if let Some(key) = key {
        let already_set = url.query_pairs().any(|(k, _)| k == API_KEY_PARAM);
        if !already_set {
            url.query_pairs_mut().append_pair(API_KEY_PARAM, key);
        }
    }
    Ok(url)
}

async fn forward(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        warn!(path = uri.path(), %method, "Rejected non-GET request");
        let body = json!({ "error": format!("method {method} not allowed") }).to_string();
        let mut resp = json_response(StatusCode::METHOD_NOT_ALLOWED, body.into_bytes());
        resp.headers_mut().insert(ALLOW, HeaderValue::from_static("GET"));
        return resp;
    }
    match relay(&state, &uri).await {
        Ok(body) => {
            info!(path = uri.path(), status = 200, "Forwarded");
            json_response(StatusCode::OK, body)
        }
        Err(e) => {
            warn!(path = uri.path(), error = %e, "Upstream request failed");
            let body = json!({ "error": e.to_string() }).to_string();
            json_response(StatusCode::INTERNAL_SERVER_ERROR, body.into_bytes())
        }
    }
}

/// Fetch upstream and return the body unchanged if it is a successful JSON reply.
async fn relay(state: &AppState, uri: &Uri) -> Result<Vec<u8>, CoreError> {
    let url = upstream_url(&state.config, uri)?;
    let resp = state.client.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(CoreError::FeedUnavailable {
            provider: "upstream".into(),
            status: Some(status.as_u16()),
            message: format!("upstream returned status {status}"),
        });
    }

    let body = resp.bytes().await?;
    serde_json::from_slice::<serde_json::Value>(&body).map_err(|e| CoreError::FeedUnavailable {
        provider: "upstream".into(),
        status: Some(status.as_u16()),
        message: format!("upstream returned invalid JSON: {e}"),
    })?;
    Ok(body.to_vec())
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

/// URL for logs: the upstream root without any query string.
pub fn display_upstream(config: &ProxyConfig) -> String {
    redact_query(&config.upstream_base)
}
