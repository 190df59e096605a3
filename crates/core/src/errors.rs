use thiserror::Error;

/// Unified error type for the entire coinfolio-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Feed ────────────────────────────────────────────────────────
    #[error("Invalid feed request: {0}")]
    InvalidRequest(String),

    #[error("Feed unavailable ({provider}{}): {message}", status_suffix(.status))]
    FeedUnavailable {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Valuation ───────────────────────────────────────────────────
    #[error("Degenerate computation: {0}")]
    ComputationDegenerate(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid holding: {0}")]
    InvalidHolding(String),
}

impl CoreError {
    /// Errors that mean "the feed could not deliver this cycle".
    /// These put the dashboard into the degraded state with fallback data.
    pub fn is_feed_failure(&self) -> bool {
        matches!(
            self,
            CoreError::FeedUnavailable { .. } | CoreError::Network(_) | CoreError::Deserialization(_)
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors often contain the full URL, and the query string
        // may carry the API key.
        CoreError::Network(redact_query(&e.to_string()))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(", HTTP {s}")).unwrap_or_default()
}

/// Strip everything after the first `?` so query parameters never reach logs.
pub fn redact_query(msg: &str) -> String {
    match msg.find('?') {
        Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
        None => msg.to_string(),
    }
}
