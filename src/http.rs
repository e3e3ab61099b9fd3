// =============================================================================
// HTTP layer — shared client and bounded-retry GET
// =============================================================================
//
// Every outbound call in the pipeline goes through `get_json`: a blocking
// round-trip with a fixed timeout, retried a small fixed number of times with
// linearly increasing backoff. The retry policy is a value, kept separate
// from the call sites.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Per-request timeout applied by the shared client.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Browser-like user agent; CoinGecko and the exchange data endpoints answer
/// differently to bare library agents.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Build the single `reqwest::Client` shared by every fetcher in a run.
pub fn build_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .context("failed to build HTTP client")
}

/// Bounded retry with linear backoff: the wait before retrying attempt `k`
/// (1-based) is `base_delay * k`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Backoff after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 2000)
    }
}

/// GET `url` and parse the body as JSON, retrying per `policy`.
///
/// Timeouts, connection errors, non-2xx statuses, and malformed JSON all
/// count as transport failures and consume one attempt each. After the
/// budget is exhausted the last error is returned; each call site gets a
/// fresh budget.
pub async fn get_json(client: &reqwest::Client, url: &str, policy: RetryPolicy) -> Result<Value> {
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts {
        match try_get(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                warn!(
                    url,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "request attempt failed"
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
                last_err = Some(e);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| anyhow::anyhow!("retry budget is zero"));
    Err(err.context(format!(
        "GET {url} failed after {} attempts",
        policy.max_attempts
    )))
}

async fn try_get(client: &reqwest::Client, url: &str) -> Result<Value> {
    let resp = client.get(url).send().await.context("request failed")?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {status}");
    }

    resp.json().await.context("response body is not valid JSON")
}
