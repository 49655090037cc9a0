use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

/// Fixed client identifier so operators of the polled feeds can
/// recognize the bot.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; NewswireBot/1.0)";

/// Default per-request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Transport failures while fetching a feed. Non-fatal to a refresh;
/// the coordinator records them per source and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// HTTP response with a non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

/// Retrieves raw feed bytes over HTTP. Does not retry; retry policy, if
/// any, belongs to the caller.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// The client-level timeout surfaces as a generic reqwest error; split
/// it out so callers see a distinct timeout condition.
fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e)
    }
}
