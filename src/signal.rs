// =============================================================================
// Sentiment Engine — crowd positioning extremity as a contrarian flag
// =============================================================================
//
// The long-side fraction of a single designated reading maps onto five bands:
//
//   long >= 70%  =>  extreme_long
//   long >= 60%  =>  long
//   long <= 30%  =>  extreme_short
//   long <= 40%  =>  short
//   otherwise    =>  neutral
//
// Strength measures distance from the balanced 50/50 midpoint, scaled so a
// fully one-sided crowd scores 100.

use crate::types::{BinanceRatios, MetricKind, RatioReading, SentimentLabel};

/// Map a long-side fraction to a sentiment label and strength.
///
/// Total over all inputs; bands are evaluated top-down, first match wins.
/// Input fractions are not validated here; callers feed exchange payload
/// values already in [0, 1].
pub fn derive_signal(long_fraction: f64) -> (SentimentLabel, u32) {
    if long_fraction >= 0.70 {
        (SentimentLabel::ExtremeLong, strength_long(long_fraction))
    } else if long_fraction >= 0.60 {
        (SentimentLabel::Long, strength_long(long_fraction))
    } else if long_fraction <= 0.30 {
        (SentimentLabel::ExtremeShort, strength_short(long_fraction))
    } else if long_fraction <= 0.40 {
        (SentimentLabel::Short, strength_short(long_fraction))
    } else {
        (SentimentLabel::Neutral, 0)
    }
}

fn strength_long(long_fraction: f64) -> u32 {
    ((long_fraction - 0.5) * 200.0).round() as u32
}

fn strength_short(long_fraction: f64) -> u32 {
    ((0.5 - long_fraction) * 200.0).round() as u32
}

/// Assess an optional reading: no data means neutral, never an omission.
pub fn assess(reading: Option<&RatioReading>) -> (SentimentLabel, u32) {
    match reading {
        Some(r) => derive_signal(r.long),
        None => (SentimentLabel::Neutral, 0),
    }
}

/// Pick the authoritative reading for signal derivation: the first present
/// Binance metric kind in `priority` order, then the Bybit reading.
pub fn select_reading<'a>(
    binance: Option<&'a BinanceRatios>,
    bybit: Option<&'a RatioReading>,
    priority: &[MetricKind],
) -> Option<&'a RatioReading> {
    if let Some(ratios) = binance {
        for kind in priority {
            if let Some(reading) = ratios.get(*kind) {
                return Some(reading);
            }
        }
    }
    bybit
}
