// =============================================================================
// Snapshot Archive — one compact JSON record per UTC calendar day
// =============================================================================
//
// The archive is a directory of `YYYY-MM-DD.json` files. At the date-key
// granularity it only ever grows; within a single day the record is
// overwritten wholesale (last run of the day wins). Loading scans the
// directory and skips any record that fails to parse, so one corrupt day
// never poisons the rest.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{Archive, CoinRecord, DailyCoinEntry, DailySnapshot};

/// Serialise `value` to `path` via a tmp + rename pair, so a crash mid-write
/// never leaves a truncated file behind.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("failed to serialise to JSON")?;

    let tmp_path = path.with_extension("json.tmp");

    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename into {}", path.display()))?;

    Ok(())
}

/// Project the enriched coin list into a compact daily snapshot. Absent
/// readings flatten to 0 in this record.
pub fn snapshot_from_coins(coins: &[CoinRecord]) -> DailySnapshot {
    coins
        .iter()
        .map(|coin| {
            let binance = coin
                .binance
                .as_ref()
                .and_then(|ratios| ratios.representative());
            let entry = DailyCoinEntry {
                price: coin.price,
                binance_long: binance.map(|r| r.long).unwrap_or(0.0),
                binance_short: binance.map(|r| r.short).unwrap_or(0.0),
                bybit_long: coin.bybit.map(|r| r.long).unwrap_or(0.0),
                bybit_short: coin.bybit.map(|r| r.short).unwrap_or(0.0),
            };
            (coin.symbol.clone(), entry)
        })
        .collect()
}

/// Write today's (UTC) snapshot, replacing any record already present for
/// the same date. Returns the date key for logging.
pub fn write_today(dir: &Path, coins: &[CoinRecord]) -> Result<String> {
    let date = Utc::now().format("%Y-%m-%d").to_string();
    write_day(dir, &date, coins)?;
    Ok(date)
}

fn write_day(dir: &Path, date: &str, coins: &[CoinRecord]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create archive dir {}", dir.display()))?;

    let snapshot = snapshot_from_coins(coins);
    let path = dir.join(format!("{date}.json"));
    write_json_atomic(&path, &snapshot)?;

    debug!(date, coins = snapshot.len(), "daily snapshot written");
    Ok(())
}

/// Load every readable day record under `dir`, keyed by date. A missing
/// directory is an empty archive; unreadable or malformed records are
/// logged and skipped.
pub fn load_all(dir: &Path) -> Archive {
    let mut archive = Archive::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            debug!(dir = %dir.display(), "no archive directory yet");
            return archive;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension() != Some(OsStr::new("json")) {
            continue;
        }
        let Some(date) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };

        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str::<DailySnapshot>(&content).map_err(Into::into));

        match parsed {
            Ok(snapshot) => {
                archive.insert(date.to_string(), snapshot);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable day record");
            }
        }
    }

    archive
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BinanceRatios, RatioReading, SentimentLabel};

    fn sample_coin(symbol: &str, price: f64, long: f64) -> CoinRecord {
        CoinRecord {
            id: symbol.to_lowercase(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price,
            price_change_24h: 0.0,
            market_cap: 0.0,
            market_cap_rank: 1,
            image: String::new(),
            binance: Some(BinanceRatios {
                top_account: None,
                top_position: None,
                global_account: Some(RatioReading::from_fractions(long, 1.0 - long)),
            }),
            bybit: Some(RatioReading::from_fractions(long, 1.0 - long)),
            signal: SentimentLabel::Neutral,
            signal_strength: 0,
        }
    }

    #[test]
    fn snapshot_flattens_absent_readings_to_zero() {
        let mut coin = sample_coin("BTC", 60_000.0, 0.6);
        coin.binance = None;
        coin.bybit = None;

        let snapshot = snapshot_from_coins(&[coin]);
        let entry = &snapshot["BTC"];
        assert_eq!(entry.binance_long, 0.0);
        assert_eq!(entry.bybit_short, 0.0);
        assert_eq!(entry.price, 60_000.0);
    }

    #[test]
    fn write_then_load_round_trips_today() {
        let dir = tempfile::tempdir().unwrap();

        let coins = vec![sample_coin("BTC", 60_000.0, 0.6), sample_coin("ETH", 3_000.0, 0.4)];
        let date = write_today(dir.path(), &coins).unwrap();

        let archive = load_all(dir.path());
        assert_eq!(archive.len(), 1);
        let snapshot = &archive[&date];
        assert_eq!(snapshot.len(), 2);
        assert!((snapshot["BTC"].binance_long - 0.6).abs() < 1e-12);
        assert!((snapshot["ETH"].bybit_long - 0.4).abs() < 1e-12);
    }

    #[test]
    fn same_day_write_overwrites_rather_than_duplicates() {
        let dir = tempfile::tempdir().unwrap();

        write_day(dir.path(), "2026-08-08", &[sample_coin("BTC", 100.0, 0.5)]).unwrap();
        write_day(dir.path(), "2026-08-08", &[sample_coin("BTC", 200.0, 0.5)]).unwrap();

        let archive = load_all(dir.path());
        assert_eq!(archive.len(), 1);
        assert_eq!(archive["2026-08-08"]["BTC"].price, 200.0);
    }

    #[test]
    fn corrupt_day_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();

        write_day(dir.path(), "2026-08-07", &[sample_coin("BTC", 100.0, 0.5)]).unwrap();
        std::fs::write(dir.path().join("2026-08-08.json"), "{ not json").unwrap();

        let archive = load_all(dir.path());
        assert_eq!(archive.len(), 1);
        assert!(archive.contains_key("2026-08-07"));
    }

    #[test]
    fn archive_keys_are_chronologically_ordered() {
        let dir = tempfile::tempdir().unwrap();

        write_day(dir.path(), "2026-08-08", &[]).unwrap();
        write_day(dir.path(), "2025-12-31", &[]).unwrap();
        write_day(dir.path(), "2026-01-01", &[]).unwrap();

        let archive = load_all(dir.path());
        let dates: Vec<&String> = archive.keys().collect();
        assert_eq!(dates, vec!["2025-12-31", "2026-01-01", "2026-08-08"]);
    }

    #[test]
    fn missing_directory_is_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = load_all(&dir.path().join("nope"));
        assert!(archive.is_empty());
    }

    #[test]
    fn atomic_write_leaves_no_tmp_sibling() {
        let dir = tempfile::tempdir().unwrap();
        write_day(dir.path(), "2026-08-08", &[sample_coin("BTC", 1.0, 0.5)]).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension() == Some(OsStr::new("tmp")))
            .collect();
        assert!(leftovers.is_empty());
    }
}
