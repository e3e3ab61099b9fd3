// =============================================================================
// Pipeline Orchestrator — one sequential run end to end
// =============================================================================
//
// universe -> futures filter -> per-coin ratio fetch -> signal -> today's
// snapshot -> archive reload -> top-N histories -> final document.
//
// Universe acquisition is the only fatal step; it happens before any write,
// so a failed run leaves the previous artifacts untouched. Everything after
// it degrades per coin / per metric instead of aborting.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::PipelineConfig;
use crate::exchanges::binance::BinanceFutures;
use crate::exchanges::bybit::BybitLinear;
use crate::signal;
use crate::types::{HistoryPoint, OutputDocument, UniverseDocument};
use crate::universe;

/// Counters surfaced in the final log line.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub coins: usize,
    pub binance_readings: usize,
    pub bybit_readings: usize,
    pub histories: usize,
    pub archive_days: usize,
}

/// Execute one full pipeline run.
pub async fn run(client: &reqwest::Client, config: &PipelineConfig) -> Result<RunSummary> {
    let policy = config.retry_policy();

    let binance = config
        .binance
        .enabled
        .then(|| BinanceFutures::new(client.clone(), policy, config.binance.period.as_str()));
    let bybit = config
        .bybit
        .enabled
        .then(|| BybitLinear::new(client.clone(), policy, config.bybit.period.as_str()));

    // ── 1. Universe (fatal on failure, nothing written yet) ──────────────
    let coins = universe::build_universe(client, config).await?;
    anyhow::ensure!(!coins.is_empty(), "coin universe is empty");

    // ── 2. Futures availability filter ───────────────────────────────────
    let binance_pairs = match &binance {
        Some(ex) => ex
            .perpetual_symbols()
            .await
            .map_err(|e| warn!(error = %e, "Binance symbol enumeration failed"))
            .ok(),
        None => None,
    };
    let bybit_pairs = match &bybit {
        Some(ex) => ex
            .perpetual_symbols()
            .await
            .map_err(|e| warn!(error = %e, "Bybit symbol enumeration failed"))
            .ok(),
        None => None,
    };

    let mut coins = universe::apply_futures_filter(
        coins,
        binance_pairs.as_ref(),
        bybit_pairs.as_ref(),
        config.futures_filter,
    );
    info!(count = coins.len(), "universe after futures filter");

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    // ── 3. Minimal universe artifact ─────────────────────────────────────
    let universe_doc = UniverseDocument {
        updated_at: now_iso(),
        coins: coins.clone(),
    };
    archive::write_json_atomic(&config.data_dir.join("coins.json"), &universe_doc)?;

    // ── 4. Per-coin enrichment, strictly sequential ──────────────────────
    for coin in coins.iter_mut() {
        if let Some(ex) = &binance {
            let ratios = ex.fetch_ratios(&coin.symbol).await;
            coin.binance = (!ratios.is_empty()).then_some(ratios);
            tokio::time::sleep(config.binance.pause()).await;
        }
        if let Some(ex) = &bybit {
            coin.bybit = ex.fetch_ratio(&coin.symbol).await;
            tokio::time::sleep(config.bybit.pause()).await;
        }

        let reading = signal::select_reading(
            coin.binance.as_ref(),
            coin.bybit.as_ref(),
            &config.signal_priority,
        );
        let (label, strength) = signal::assess(reading);
        coin.signal = label;
        coin.signal_strength = strength;

        debug!(
            symbol = %coin.symbol,
            signal = %coin.signal,
            strength = coin.signal_strength,
            "coin enriched"
        );
    }

    // ── 5. Today's snapshot, then the full archive ───────────────────────
    let history_dir = config.data_dir.join("history");
    let date = archive::write_today(&history_dir, &coins)?;
    let daily_history = archive::load_all(&history_dir);
    info!(date = %date, days = daily_history.len(), "archive updated");

    // ── 6. Trend histories for the top-ranked subset ─────────────────────
    let mut histories: BTreeMap<String, Vec<HistoryPoint>> = BTreeMap::new();
    if let Some(ex) = &binance {
        for coin in coins.iter().take(config.binance.history_top_n) {
            let points = ex
                .fetch_history(&coin.symbol, config.binance.history_limit)
                .await;
            if !points.is_empty() {
                histories.insert(coin.symbol.clone(), points);
            }
            tokio::time::sleep(config.binance.pause()).await;
        }
    } else if let Some(ex) = &bybit {
        for coin in coins.iter().take(config.bybit.history_top_n) {
            let points = ex
                .fetch_history(&coin.symbol, config.bybit.history_limit)
                .await;
            if !points.is_empty() {
                histories.insert(coin.symbol.clone(), points);
            }
            tokio::time::sleep(config.bybit.pause()).await;
        }
    }

    // ── 7. Final combined document ───────────────────────────────────────
    let summary = RunSummary {
        coins: coins.len(),
        binance_readings: coins.iter().filter(|c| c.binance.is_some()).count(),
        bybit_readings: coins.iter().filter(|c| c.bybit.is_some()).count(),
        histories: histories.len(),
        archive_days: daily_history.len(),
    };

    let document = OutputDocument {
        updated_at: now_iso(),
        coins,
        histories,
        daily_history,
    };
    archive::write_json_atomic(&config.data_dir.join("longshort.json"), &document)?;

    Ok(summary)
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
