// =============================================================================
// Exchange fetchers
// =============================================================================
//
// One submodule per derivatives exchange. Both expose the same surface:
//
//   perpetual_symbols  — tradable USDT-margined perpetual pairs
//   fetch_*            — current long/short reading(s), absent on failure
//   fetch_history      — ordered ticks oldest-first, empty on failure
//
// Transport failures never cross these module boundaries; they are logged
// and collapse to `None` / empty.

pub mod binance;
pub mod bybit;

use serde_json::Value;

/// Read a numeric payload field that may arrive as a decimal string or a
/// bare number (both exchanges mix the two).
pub(crate) fn decimal_field(entry: &Value, key: &str) -> Option<f64> {
    let v = &entry[key];
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else {
        v.as_f64()
    }
}

/// Format a millisecond epoch timestamp as `YYYY-MM-DD HH:MM` UTC.
pub(crate) fn format_minute(ts_ms: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decimal_field_accepts_strings_and_numbers() {
        let entry = json!({ "a": "0.6123", "b": 0.25, "c": "junk" });
        assert_eq!(decimal_field(&entry, "a"), Some(0.6123));
        assert_eq!(decimal_field(&entry, "b"), Some(0.25));
        assert_eq!(decimal_field(&entry, "c"), None);
        assert_eq!(decimal_field(&entry, "missing"), None);
    }

    #[test]
    fn minute_formatting_is_utc() {
        // 2024-05-01 12:34:56 UTC
        assert_eq!(
            format_minute(1_714_566_896_000),
            Some("2024-05-01 12:34".to_string())
        );
    }
}
