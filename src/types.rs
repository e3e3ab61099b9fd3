// =============================================================================
// Shared types used across the crowdpulse pipeline
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Floor applied to the short-side fraction when deriving a long/short ratio,
/// so a fully one-sided reading never divides by zero.
pub const MIN_SHORT_FRACTION: f64 = 0.001;

/// A point-in-time long/short split for one coin on one exchange.
///
/// `long` and `short` are fractions in [0, 1] as reported by the exchange;
/// they are not forced to sum to exactly 1. `ratio` is always re-derived
/// from the fractions rather than trusted from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioReading {
    pub long: f64,
    pub short: f64,
    pub ratio: f64,
}

impl RatioReading {
    /// Build a reading from the raw fractions, deriving the ratio.
    pub fn from_fractions(long: f64, short: f64) -> Self {
        Self {
            long,
            short,
            ratio: long / short.max(MIN_SHORT_FRACTION),
        }
    }
}

/// The three long/short metric kinds Binance publishes per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    TopAccount,
    TopPosition,
    GlobalAccount,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TopAccount => write!(f, "top_account"),
            Self::TopPosition => write!(f, "top_position"),
            Self::GlobalAccount => write!(f, "global_account"),
        }
    }
}

/// Per-symbol bundle of the three Binance metric kinds, each independently
/// fetched and therefore independently absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinanceRatios {
    pub top_account: Option<RatioReading>,
    pub top_position: Option<RatioReading>,
    pub global_account: Option<RatioReading>,
}

impl BinanceRatios {
    pub fn get(&self, kind: MetricKind) -> Option<&RatioReading> {
        match kind {
            MetricKind::TopAccount => self.top_account.as_ref(),
            MetricKind::TopPosition => self.top_position.as_ref(),
            MetricKind::GlobalAccount => self.global_account.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top_account.is_none() && self.top_position.is_none() && self.global_account.is_none()
    }

    /// The reading used for the compact daily record: the global-account
    /// reading, falling back to the top-trader kinds when it is absent.
    pub fn representative(&self) -> Option<&RatioReading> {
        self.global_account
            .as_ref()
            .or(self.top_account.as_ref())
            .or(self.top_position.as_ref())
    }
}

/// Categorical crowd-positioning sentiment for one coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    ExtremeLong,
    Long,
    Neutral,
    Short,
    ExtremeShort,
}

impl Default for SentimentLabel {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtremeLong => write!(f, "extreme_long"),
            Self::Long => write!(f, "long"),
            Self::Neutral => write!(f, "neutral"),
            Self::Short => write!(f, "short"),
            Self::ExtremeShort => write!(f, "extreme_short"),
        }
    }
}

/// Identity and market facts for one asset, enriched in place during a run.
///
/// Absent readings stay `None` (serialised as `null`) so consumers can tell
/// "no data" apart from a balanced 50/50 reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRecord {
    pub id: String,
    /// Uppercase ticker, unique within a run.
    pub symbol: String,
    pub name: String,
    /// Spot price in USD; 0 when the provider has no price.
    pub price: f64,
    /// Signed 24 h change in percent.
    pub price_change_24h: f64,
    pub market_cap: f64,
    /// Provider-assigned rank, 1-based.
    pub market_cap_rank: u32,
    pub image: String,

    #[serde(default)]
    pub binance: Option<BinanceRatios>,
    #[serde(default)]
    pub bybit: Option<RatioReading>,
    #[serde(default)]
    pub signal: SentimentLabel,
    #[serde(default)]
    pub signal_strength: u32,
}

/// One historical tick for one coin on one exchange, minute precision UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// `YYYY-MM-DD HH:MM`
    pub timestamp: String,
    pub long: f64,
    pub short: f64,
    pub ratio: f64,
}

/// Compact per-coin entry inside a daily snapshot. Absent readings flatten
/// to 0 in this record; the full artifact keeps them `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyCoinEntry {
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub binance_long: f64,
    #[serde(default)]
    pub binance_short: f64,
    #[serde(default)]
    pub bybit_long: f64,
    #[serde(default)]
    pub bybit_short: f64,
}

/// One calendar day's positioning record, keyed by coin symbol.
pub type DailySnapshot = BTreeMap<String, DailyCoinEntry>;

/// All daily snapshots ever produced, keyed by ISO date. `BTreeMap` keeps
/// the ISO-date keys in ascending (= chronological) order.
pub type Archive = BTreeMap<String, DailySnapshot>;

/// Minimal universe artifact: the ranked coin list and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseDocument {
    pub updated_at: String,
    pub coins: Vec<CoinRecord>,
}

/// The full artifact written at the end of a successful run. Replaces the
/// previous one wholesale; `daily_history` is the only part that accumulates
/// across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDocument {
    pub updated_at: String,
    pub coins: Vec<CoinRecord>,
    pub histories: BTreeMap<String, Vec<HistoryPoint>>,
    pub daily_history: Archive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_derived_from_fractions() {
        let r = RatioReading::from_fractions(0.6, 0.4);
        assert!((r.ratio - 1.5).abs() < 1e-12);
    }

    #[test]
    fn zero_short_side_uses_floor() {
        let r = RatioReading::from_fractions(0.8, 0.0);
        assert_eq!(r.ratio, 0.8 / 0.001);
    }

    #[test]
    fn sentiment_labels_serialise_snake_case() {
        assert_eq!(
            serde_json::to_string(&SentimentLabel::ExtremeLong).unwrap(),
            "\"extreme_long\""
        );
        assert_eq!(
            serde_json::to_string(&SentimentLabel::ExtremeShort).unwrap(),
            "\"extreme_short\""
        );
        let back: SentimentLabel = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(back, SentimentLabel::Neutral);
    }

    #[test]
    fn representative_prefers_global_account() {
        let global = RatioReading::from_fractions(0.7, 0.3);
        let top = RatioReading::from_fractions(0.5, 0.5);
        let ratios = BinanceRatios {
            top_account: Some(top),
            top_position: None,
            global_account: Some(global),
        };
        assert_eq!(ratios.representative(), Some(&global));

        let ratios = BinanceRatios {
            top_account: Some(top),
            top_position: None,
            global_account: None,
        };
        assert_eq!(ratios.representative(), Some(&top));
        assert!(BinanceRatios::default().representative().is_none());
    }

    #[test]
    fn absent_readings_serialise_as_null() {
        let coin = CoinRecord {
            id: "bitcoin".into(),
            symbol: "BTC".into(),
            name: "Bitcoin".into(),
            price: 60_000.0,
            price_change_24h: 1.2,
            market_cap: 1.2e12,
            market_cap_rank: 1,
            image: String::new(),
            binance: None,
            bybit: None,
            signal: SentimentLabel::Neutral,
            signal_strength: 0,
        };
        let json = serde_json::to_value(&coin).unwrap();
        assert!(json["binance"].is_null());
        assert!(json["bybit"].is_null());
        assert_eq!(json["signal"], "neutral");
    }
}
