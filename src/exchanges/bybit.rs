// =============================================================================
// Bybit Linear — single account-ratio endpoint per symbol
// =============================================================================
//
// Bybit v5 wraps every payload in a {retCode, retMsg, result} envelope; a
// non-zero retCode is a failed call even with HTTP 200. The account-ratio
// entry shape is buyRatio / sellRatio as decimal string fractions, and
// history lists arrive newest-first.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::exchanges::{decimal_field, format_minute};
use crate::http::{get_json, RetryPolicy};
use crate::types::{HistoryPoint, RatioReading};

const BASE_URL: &str = "https://api.bybit.com";

/// Fetcher for the Bybit v5 linear (USDT-perpetual) market endpoints.
pub struct BybitLinear {
    client: reqwest::Client,
    policy: RetryPolicy,
    period: String,
}

impl BybitLinear {
    pub fn new(client: reqwest::Client, policy: RetryPolicy, period: impl Into<String>) -> Self {
        Self {
            client,
            policy,
            period: period.into(),
        }
    }

    /// Pairs with an actively tradable USDT-margined perpetual contract.
    pub async fn perpetual_symbols(&self) -> Result<HashSet<String>> {
        let url = format!("{BASE_URL}/v5/market/instruments-info?category=linear&limit=1000");
        let body = get_json(&self.client, &url, self.policy).await?;
        let list = result_list(&body)?;

        let pairs: HashSet<String> = list
            .iter()
            .filter(|s| {
                s["contractType"] == "LinearPerpetual"
                    && s["quoteCoin"] == "USDT"
                    && s["status"] == "Trading"
            })
            .filter_map(|s| s["symbol"].as_str().map(str::to_string))
            .collect();

        debug!(count = pairs.len(), "Bybit perpetual pairs enumerated");
        Ok(pairs)
    }

    /// Current account ratio for `symbol` (base asset). Absent on failure.
    pub async fn fetch_ratio(&self, symbol: &str) -> Option<RatioReading> {
        let url = format!(
            "{BASE_URL}/v5/market/account-ratio?category=linear&symbol={symbol}USDT&period={}&limit=1",
            self.period
        );

        match self.fetch_entries(&url).await {
            Ok(entries) => {
                let reading = entries.first().and_then(parse_ratio_entry);
                if reading.is_none() {
                    warn!(symbol, "empty or malformed account-ratio payload");
                }
                reading
            }
            Err(e) => {
                warn!(symbol, error = %e, "account-ratio fetch failed");
                None
            }
        }
    }

    /// Account-ratio history, reversed to oldest-first. Empty on failure.
    pub async fn fetch_history(&self, symbol: &str, limit: u32) -> Vec<HistoryPoint> {
        let url = format!(
            "{BASE_URL}/v5/market/account-ratio?category=linear&symbol={symbol}USDT&period={}&limit={limit}",
            self.period
        );

        match self.fetch_entries(&url).await {
            Ok(entries) => {
                let mut points: Vec<HistoryPoint> =
                    entries.iter().filter_map(parse_history_entry).collect();
                // The feed is newest-first.
                points.reverse();
                debug!(symbol, count = points.len(), "Bybit ratio history fetched");
                points
            }
            Err(e) => {
                warn!(symbol, error = %e, "history fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_entries(&self, url: &str) -> Result<Vec<Value>> {
        let body = get_json(&self.client, url, self.policy).await?;
        Ok(result_list(&body)?.clone())
    }
}

/// Unwrap the v5 envelope, treating a non-zero retCode as failure.
fn result_list(body: &Value) -> Result<&Vec<Value>> {
    let ret_code = body["retCode"].as_i64().unwrap_or(-1);
    if ret_code != 0 {
        anyhow::bail!(
            "Bybit API returned retCode {ret_code}: {}",
            body["retMsg"].as_str().unwrap_or("")
        );
    }
    body["result"]["list"]
        .as_array()
        .context("Bybit response missing result.list")
}

fn parse_ratio_entry(entry: &Value) -> Option<RatioReading> {
    let long = decimal_field(entry, "buyRatio")?;
    let short = decimal_field(entry, "sellRatio")?;
    Some(RatioReading::from_fractions(long, short))
}

fn parse_history_entry(entry: &Value) -> Option<HistoryPoint> {
    // Bybit serialises the millisecond timestamp as a string.
    let ts_ms = match &entry["timestamp"] {
        Value::String(s) => s.parse().ok()?,
        v => v.as_i64()?,
    };
    let reading = parse_ratio_entry(entry)?;
    Some(HistoryPoint {
        timestamp: format_minute(ts_ms)?,
        long: reading.long,
        short: reading.short,
        ratio: reading.ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_account_ratio_entry() {
        let entry = json!({
            "symbol": "BTCUSDT",
            "buyRatio": "0.5800",
            "sellRatio": "0.4200",
            "timestamp": "1714566896000"
        });
        let r = parse_ratio_entry(&entry).unwrap();
        assert!((r.long - 0.58).abs() < 1e-12);
        assert!((r.short - 0.42).abs() < 1e-12);
        assert!((r.ratio - 0.58 / 0.42).abs() < 1e-9);
    }

    #[test]
    fn nonzero_ret_code_is_failure() {
        let body = json!({
            "retCode": 10001,
            "retMsg": "params error",
            "result": { "list": [] }
        });
        assert!(result_list(&body).is_err());
    }

    #[test]
    fn envelope_unwraps_result_list() {
        let body = json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": { "list": [ { "buyRatio": "0.5" } ] }
        });
        assert_eq!(result_list(&body).unwrap().len(), 1);
    }

    #[test]
    fn history_entries_parse_string_timestamps() {
        let entry = json!({
            "buyRatio": "0.61",
            "sellRatio": "0.39",
            "timestamp": "1714566896000"
        });
        let p = parse_history_entry(&entry).unwrap();
        assert_eq!(p.timestamp, "2024-05-01 12:34");
    }

    #[test]
    fn history_is_reversed_to_oldest_first() {
        // Simulate the newest-first feed order through the same parse path
        // the fetcher uses.
        let entries = vec![
            json!({ "buyRatio": "0.60", "sellRatio": "0.40", "timestamp": "1714570496000" }),
            json!({ "buyRatio": "0.55", "sellRatio": "0.45", "timestamp": "1714566896000" }),
        ];
        let mut points: Vec<HistoryPoint> =
            entries.iter().filter_map(parse_history_entry).collect();
        points.reverse();

        assert_eq!(points[0].timestamp, "2024-05-01 12:34");
        assert_eq!(points[1].timestamp, "2024-05-01 13:34");
        assert!(points[0].timestamp < points[1].timestamp);
    }
}
