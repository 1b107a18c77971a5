use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared HTTP client for all page fetches. Any failure (network error,
/// timeout, non-2xx status, undecodable body) is logged and collapses to
/// `None`; callers treat the page as absent.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub async fn get_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(%url, error = %e, "fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "fetch returned non-success status");
            return None;
        }
        response.text().await.ok()
    }

    pub async fn get_json(&self, url: &str) -> Option<Value> {
        let body = self.get_text(url).await?;
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(%url, error = %e, "response was not valid JSON");
                None
            }
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
