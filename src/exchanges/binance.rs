// =============================================================================
// Binance Futures — three long/short metric kinds per symbol
// =============================================================================
//
// Binance publishes crowd positioning under /futures/data in three flavours:
//
//   topLongShortAccountRatio    — top traders, counted by account
//   topLongShortPositionRatio   — top traders, weighted by position size
//   globalLongShortAccountRatio — all traders, counted by account
//
// All three share one entry shape: longAccount / shortAccount as decimal
// string fractions. Entries in history responses are ordered oldest-first.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::exchanges::{decimal_field, format_minute};
use crate::http::{get_json, RetryPolicy};
use crate::types::{BinanceRatios, HistoryPoint, RatioReading};

const BASE_URL: &str = "https://fapi.binance.com";

/// Fetcher for the Binance USDT-margined futures data endpoints.
pub struct BinanceFutures {
    client: reqwest::Client,
    policy: RetryPolicy,
    period: String,
}

impl BinanceFutures {
    pub fn new(client: reqwest::Client, policy: RetryPolicy, period: impl Into<String>) -> Self {
        Self {
            client,
            policy,
            period: period.into(),
        }
    }

    /// Pairs with an actively tradable USDT-margined perpetual contract,
    /// e.g. `BTCUSDT`.
    pub async fn perpetual_symbols(&self) -> Result<HashSet<String>> {
        let url = format!("{BASE_URL}/fapi/v1/exchangeInfo");
        let body = get_json(&self.client, &url, self.policy).await?;

        let symbols = body["symbols"]
            .as_array()
            .context("exchangeInfo response missing 'symbols' array")?;

        let pairs: HashSet<String> = symbols
            .iter()
            .filter(|s| {
                s["contractType"] == "PERPETUAL"
                    && s["quoteAsset"] == "USDT"
                    && s["status"] == "TRADING"
            })
            .filter_map(|s| s["symbol"].as_str().map(str::to_string))
            .collect();

        debug!(count = pairs.len(), "Binance perpetual pairs enumerated");
        Ok(pairs)
    }

    /// Fetch all three metric kinds for `symbol` (base asset, e.g. `BTC`).
    /// Each kind fails independently; a kind that cannot be fetched is
    /// simply absent in the result.
    pub async fn fetch_ratios(&self, symbol: &str) -> BinanceRatios {
        BinanceRatios {
            top_account: self.fetch_kind("topLongShortAccountRatio", symbol).await,
            top_position: self.fetch_kind("topLongShortPositionRatio", symbol).await,
            global_account: self.fetch_kind("globalLongShortAccountRatio", symbol).await,
        }
    }

    async fn fetch_kind(&self, endpoint: &str, symbol: &str) -> Option<RatioReading> {
        let url = format!(
            "{BASE_URL}/futures/data/{endpoint}?symbol={symbol}USDT&period={}&limit=1",
            self.period
        );

        match get_json(&self.client, &url, self.policy).await {
            Ok(body) => {
                let reading = body
                    .as_array()
                    .and_then(|arr| arr.first())
                    .and_then(parse_ratio_entry);
                if reading.is_none() {
                    warn!(symbol, endpoint, "empty or malformed ratio payload");
                }
                reading
            }
            Err(e) => {
                warn!(symbol, endpoint, error = %e, "ratio fetch failed");
                None
            }
        }
    }

    /// Global-account ratio history, oldest-first. Empty on failure.
    pub async fn fetch_history(&self, symbol: &str, limit: u32) -> Vec<HistoryPoint> {
        let url = format!(
            "{BASE_URL}/futures/data/globalLongShortAccountRatio?symbol={symbol}USDT&period={}&limit={limit}",
            self.period
        );

        match get_json(&self.client, &url, self.policy).await {
            Ok(body) => {
                // Binance already orders these oldest-first.
                let points: Vec<HistoryPoint> = body
                    .as_array()
                    .map(|arr| arr.iter().filter_map(parse_history_entry).collect())
                    .unwrap_or_default();
                debug!(symbol, count = points.len(), "Binance ratio history fetched");
                points
            }
            Err(e) => {
                warn!(symbol, error = %e, "history fetch failed");
                Vec::new()
            }
        }
    }
}

/// Parse one `/futures/data` ratio entry. The ratio is re-derived from the
/// fractions; the payload's own `longShortRatio` field is ignored.
pub(crate) fn parse_ratio_entry(entry: &Value) -> Option<RatioReading> {
    let long = decimal_field(entry, "longAccount")?;
    let short = decimal_field(entry, "shortAccount")?;
    Some(RatioReading::from_fractions(long, short))
}

fn parse_history_entry(entry: &Value) -> Option<HistoryPoint> {
    let ts_ms = entry["timestamp"].as_i64()?;
    let reading = parse_ratio_entry(entry)?;
    Some(HistoryPoint {
        timestamp: format_minute(ts_ms)?,
        long: reading.long,
        short: reading.short,
        ratio: reading.ratio,
    })
}
