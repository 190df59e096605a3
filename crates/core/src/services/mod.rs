pub mod fallback_service;
pub mod market_service;
pub mod presentation_service;
#[cfg(not(target_arch = "wasm32"))]
pub mod refresh_service;
pub mod valuation_service;
