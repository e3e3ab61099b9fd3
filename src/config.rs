// =============================================================================
// Pipeline Configuration — immutable per-run settings loaded from JSON
// =============================================================================
//
// Every field carries a `#[serde(default)]` so that a partial or missing
// config file never breaks a run; the exclusion list and the signal priority
// are plain data here rather than process-wide state, so a run (or a test)
// can override them wholesale.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http::RetryPolicy;
use crate::types::MetricKind;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_universe_limit() -> usize {
    50
}

fn default_candidate_pool() -> u32 {
    80
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_signal_priority() -> Vec<MetricKind> {
    vec![
        MetricKind::GlobalAccount,
        MetricKind::TopAccount,
        MetricKind::TopPosition,
    ]
}

/// Stablecoins, wrapped/staked derivatives, and exchange-utility tokens that
/// never belong in a positioning universe.
fn default_excluded_symbols() -> Vec<String> {
    [
        // stablecoins
        "USDT", "USDC", "BUSD", "DAI", "TUSD", "USDP", "FDUSD", "USDD", "PYUSD", "USDE",
        "SUSDE", "SDAI", "FRAX", "LUSD", "CRVUSD", "GHO", "ALUSD", "USDS", "USD0", "EURC",
        "RLUSD",
        // wrapped / staked derivatives
        "WBTC", "WETH", "STETH", "WSTETH", "CBBTC", "CBETH", "RETH", "LIDO", "BETH",
        // exchange tokens and delisted remnants
        "LEO", "SHIB2", "CRO", "OKB", "GT", "KCS", "HT", "FTT", "MX",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_period() -> String {
    "1h".to_string()
}

fn default_binance_pause_ms() -> u64 {
    300
}

fn default_bybit_pause_ms() -> u64 {
    200
}

fn default_history_limit() -> u32 {
    48
}

fn default_binance_history_top_n() -> usize {
    15
}

fn default_bybit_history_top_n() -> usize {
    10
}

// =============================================================================
// Exchange settings
// =============================================================================

/// Whether universe candidates must be listed on any configured exchange's
/// perpetual futures, or on all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuturesFilter {
    Any,
    All,
}

impl Default for FuturesFilter {
    fn default() -> Self {
        Self::Any
    }
}

/// Per-exchange fetch settings shared by both exchange fetchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ratio sampling period as the exchange spells it (both accept "1h").
    #[serde(default = "default_period")]
    pub period: String,

    /// Cooperative pause between successive coin fetches. Pacing only;
    /// skipping it risks upstream throttling, not corruption.
    #[serde(default = "default_binance_pause_ms")]
    pub pause_ms: u64,

    /// Points requested per history fetch.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// History is only fetched for this many top-ranked coins.
    #[serde(default = "default_binance_history_top_n")]
    pub history_top_n: usize,
}

impl ExchangeSettings {
    fn binance_defaults() -> Self {
        Self {
            enabled: true,
            period: default_period(),
            pause_ms: default_binance_pause_ms(),
            history_limit: default_history_limit(),
            history_top_n: default_binance_history_top_n(),
        }
    }

    fn bybit_defaults() -> Self {
        Self {
            enabled: true,
            period: default_period(),
            pause_ms: default_bybit_pause_ms(),
            history_limit: default_history_limit(),
            history_top_n: default_bybit_history_top_n(),
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

// =============================================================================
// PipelineConfig
// =============================================================================

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target universe size after exclusions.
    #[serde(default = "default_universe_limit")]
    pub universe_limit: usize,

    /// Candidates requested from the market-data provider; larger than
    /// `universe_limit` to compensate for exclusions.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: u32,

    /// Symbols dropped from the universe regardless of rank.
    #[serde(default = "default_excluded_symbols")]
    pub excluded_symbols: Vec<String>,

    /// Perpetual-listing intersection semantics.
    #[serde(default)]
    pub futures_filter: FuturesFilter,

    /// Root directory for all persisted artifacts.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Binance metric kinds in the order they are considered authoritative
    /// for signal derivation; the Bybit reading is the final fallback.
    #[serde(default = "default_signal_priority")]
    pub signal_priority: Vec<MetricKind>,

    #[serde(default = "ExchangeSettings::binance_defaults")]
    pub binance: ExchangeSettings,

    #[serde(default = "ExchangeSettings::bybit_defaults")]
    pub bybit: ExchangeSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            universe_limit: default_universe_limit(),
            candidate_pool: default_candidate_pool(),
            excluded_symbols: default_excluded_symbols(),
            futures_filter: FuturesFilter::default(),
            data_dir: default_data_dir(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            signal_priority: default_signal_priority(),
            binance: ExchangeSettings::binance_defaults(),
            bybit: ExchangeSettings::bybit_defaults(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            universe_limit = config.universe_limit,
            futures_filter = ?config.futures_filter,
            "pipeline config loaded"
        );

        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_delay_ms)
    }

    /// Exclusion set normalised to uppercase for case-insensitive matching.
    pub fn exclusion_set(&self) -> HashSet<String> {
        self.excluded_symbols
            .iter()
            .map(|s| s.to_uppercase())
            .collect()
    }
}
