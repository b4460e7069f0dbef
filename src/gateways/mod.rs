//! Clients for the third-party services the backend calls out to.

pub mod airtime_api;
pub mod document_store;
pub mod price_api;
pub mod transfer_api;

use crate::errors::{AppError, Result};
use std::time::Duration;

/// Shared outbound HTTP client with a per-request deadline.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("tradevault/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}
