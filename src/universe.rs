// =============================================================================
// Universe Builder — ranked coin list from CoinGecko, filtered
// =============================================================================
//
// Requests more candidates than the target size so that dropping stablecoins,
// wrapped assets, and exchange tokens still leaves a full universe. Provider
// rank order is preserved end to end.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::config::{FuturesFilter, PipelineConfig};
use crate::http::get_json;
use crate::types::{CoinRecord, SentimentLabel};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// One entry of the `/coins/markets` response. Every market fact is optional
/// on the wire; absences collapse to zero the way the provider's own
/// dashboards treat them.
#[derive(Debug, Deserialize)]
pub struct MarketEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Fetch the ranked market list and reduce it to the coin universe.
///
/// Failure here is fatal to the run; the orchestrator aborts before any
/// artifact is written.
pub async fn build_universe(
    client: &reqwest::Client,
    config: &PipelineConfig,
) -> Result<Vec<CoinRecord>> {
    let url = format!(
        "{BASE_URL}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1&sparkline=false&price_change_percentage=24h",
        config.candidate_pool
    );

    let body = get_json(client, &url, config.retry_policy())
        .await
        .context("market list fetch failed")?;

    let entries: Vec<MarketEntry> =
        serde_json::from_value(body).context("unexpected market list shape")?;

    let coins = filter_ranked(entries, &config.exclusion_set(), config.universe_limit);
    info!(count = coins.len(), "coin universe built");
    Ok(coins)
}

/// Drop excluded symbols and keep the first `limit` survivors in provider
/// rank order. Symbols are uppercased before both the exclusion check and
/// the resulting record.
pub fn filter_ranked(
    entries: Vec<MarketEntry>,
    excluded: &HashSet<String>,
    limit: usize,
) -> Vec<CoinRecord> {
    let mut coins = Vec::with_capacity(limit);

    for entry in entries {
        let symbol = entry.symbol.to_uppercase();
        if excluded.contains(&symbol) {
            continue;
        }

        coins.push(CoinRecord {
            id: entry.id,
            symbol,
            name: entry.name,
            price: entry.current_price.unwrap_or(0.0),
            price_change_24h: entry.price_change_percentage_24h.unwrap_or(0.0),
            market_cap: entry.market_cap.unwrap_or(0.0),
            market_cap_rank: entry.market_cap_rank.unwrap_or(0),
            image: entry.image.unwrap_or_default(),
            binance: None,
            bybit: None,
            signal: SentimentLabel::Neutral,
            signal_strength: 0,
        });

        if coins.len() >= limit {
            break;
        }
    }

    coins
}

/// Keep only coins whose `{SYMBOL}USDT` perpetual is listed per the filter
/// mode. A `None` symbol set means that exchange's listing is unavailable
/// (disabled or failed) and places no constraint; with no listing available
/// at all the filter is skipped entirely.
pub fn apply_futures_filter(
    coins: Vec<CoinRecord>,
    binance_pairs: Option<&HashSet<String>>,
    bybit_pairs: Option<&HashSet<String>>,
    mode: FuturesFilter,
) -> Vec<CoinRecord> {
    if binance_pairs.is_none() && bybit_pairs.is_none() {
        return coins;
    }

    coins
        .into_iter()
        .filter(|coin| {
            let pair = format!("{}USDT", coin.symbol);
            let on_binance = binance_pairs.map(|set| set.contains(&pair));
            let on_bybit = bybit_pairs.map(|set| set.contains(&pair));
            match mode {
                FuturesFilter::Any => on_binance.unwrap_or(false) || on_bybit.unwrap_or(false),
                FuturesFilter::All => on_binance.unwrap_or(true) && on_bybit.unwrap_or(true),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, symbol: &str, rank: u32) -> MarketEntry {
        MarketEntry {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: id.to_string(),
            current_price: Some(1.0),
            price_change_percentage_24h: Some(0.5),
            market_cap: Some(1000.0),
            market_cap_rank: Some(rank),
            image: None,
        }
    }

    fn excluded() -> HashSet<String> {
        ["USDT", "WBTC"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exclusion_is_case_insensitive_on_input() {
        // CoinGecko delivers lowercase tickers.
        let entries = vec![
            entry("bitcoin", "btc", 1),
            entry("tether", "usdt", 3),
            entry("ethereum", "eth", 2),
        ];
        let coins = filter_ranked(entries, &excluded(), 50);
        let symbols: Vec<&str> = coins.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
    }

    #[test]
    fn limit_caps_survivors_in_rank_order() {
        let entries = vec![
            entry("bitcoin", "btc", 1),
            entry("tether", "usdt", 2),
            entry("ethereum", "eth", 3),
            entry("solana", "sol", 4),
            entry("ripple", "xrp", 5),
        ];
        let coins = filter_ranked(entries, &excluded(), 2);
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].symbol, "BTC");
        assert_eq!(coins[1].symbol, "ETH");
    }

    #[test]
    fn missing_market_facts_default_to_zero() {
        let entries = vec![MarketEntry {
            id: "newcoin".into(),
            symbol: "new".into(),
            name: "NewCoin".into(),
            current_price: None,
            price_change_percentage_24h: None,
            market_cap: None,
            market_cap_rank: None,
            image: None,
        }];
        let coins = filter_ranked(entries, &HashSet::new(), 10);
        assert_eq!(coins[0].price, 0.0);
        assert_eq!(coins[0].market_cap_rank, 0);
    }

    fn coin(symbol: &str) -> CoinRecord {
        let entries = vec![entry(symbol, symbol, 1)];
        filter_ranked(entries, &HashSet::new(), 1).pop().unwrap()
    }

    fn pairs(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn any_mode_keeps_coins_on_either_listing() {
        let coins = vec![coin("BTC"), coin("ABC"), coin("XYZ")];
        let binance = pairs(&["BTCUSDT"]);
        let bybit = pairs(&["ABCUSDT"]);
        let kept = apply_futures_filter(coins, Some(&binance), Some(&bybit), FuturesFilter::Any);
        let symbols: Vec<&str> = kept.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ABC"]);
    }

    #[test]
    fn all_mode_requires_every_listing() {
        let coins = vec![coin("BTC"), coin("ABC")];
        let binance = pairs(&["BTCUSDT", "ABCUSDT"]);
        let bybit = pairs(&["BTCUSDT"]);
        let kept = apply_futures_filter(coins, Some(&binance), Some(&bybit), FuturesFilter::All);
        let symbols: Vec<&str> = kept.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC"]);
    }

    #[test]
    fn unavailable_listing_places_no_constraint() {
        let coins = vec![coin("BTC"), coin("ABC")];
        let binance = pairs(&["BTCUSDT"]);

        // All-mode with one listing missing degrades to the available one.
        let kept = apply_futures_filter(
            vec![coin("BTC"), coin("ABC")],
            Some(&binance),
            None,
            FuturesFilter::All,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "BTC");

        // No listings at all: filter is skipped.
        let kept = apply_futures_filter(coins, None, None, FuturesFilter::Any);
        assert_eq!(kept.len(), 2);
    }
}
