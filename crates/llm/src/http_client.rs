//! HTTP Client Factory
//!
//! Builds the reqwest client shared by both engine backends. Engines talk to
//! local inference servers, so environment proxy settings are ignored.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// TCP connect timeout. Requests themselves are not time-limited.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a `reqwest::Client` for talking to a local inference server.
pub fn build_http_client() -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| LlmError::Other {
            message: format!("failed to build HTTP client: {}", e),
        })
}
