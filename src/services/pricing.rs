//! Price synthesis from market comparables.
//!
//! Comparables carry free-form price text. Only baht-tagged amounts such as
//! `"350 ฿"` or `"฿35,000"` are used; anything else is ignored. The result is
//! always a usable estimate: with no parsable prices a fixed default range is
//! returned instead of an error.

use crate::models::item::{Comparable, PriceEstimate};

/// Currency symbol recognised in price text.
pub const CURRENCY_SYMBOL: char = '฿';

/// ISO code reported on every estimate.
pub const CURRENCY_CODE: &str = "THB";

/// Confidence attached to every estimate (0-100).
pub const BASELINE_CONFIDENCE: u8 = 85;

/// Fallback range when no comparable has a usable price.
pub const FALLBACK_MIN: f64 = 280.0;
pub const FALLBACK_MAX: f64 = 450.0;
pub const FALLBACK_SUGGESTED: f64 = 365.0;

/// Price text used for listings without a recognisable amount.
pub const PRICE_UNAVAILABLE: &str = "Price not available";

/// Parse a currency-tagged price such as `"35,000 ฿"`.
///
/// Returns `None` unless the text contains the currency symbol and the rest
/// is a finite, non-negative number once thousands separators are removed.
pub fn parse_price(text: &str) -> Option<f64> {
    if !text.contains(CURRENCY_SYMBOL) {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| *c != CURRENCY_SYMBOL && *c != ',')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

/// Find the first currency-tagged amount inside arbitrary listing text.
///
/// The amount may precede (`"1,200 ฿"`) or follow (`"฿1,200"`) the symbol.
/// Returns it normalised as `"<amount> ฿"`.
pub fn find_price_text(text: &str) -> Option<String> {
    for (idx, _) in text.match_indices(CURRENCY_SYMBOL) {
        let before = text[..idx].trim_end();
        let leading: String = before
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let after = text[idx + CURRENCY_SYMBOL.len_utf8()..].trim_start();
        let trailing: String = after
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();

        for amount in [leading, trailing] {
            let amount = amount.trim_matches(|c| c == ',' || c == '.');
            if amount.chars().any(|c| c.is_ascii_digit()) {
                let candidate = format!("{} {}", amount, CURRENCY_SYMBOL);
                if parse_price(&candidate).is_some() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

/// Fixed estimate returned when the market data has no usable prices.
pub fn fallback_estimate() -> PriceEstimate {
    PriceEstimate {
        min: FALLBACK_MIN,
        max: FALLBACK_MAX,
        suggested: FALLBACK_SUGGESTED,
        currency: CURRENCY_CODE.to_string(),
        confidence: BASELINE_CONFIDENCE,
    }
}

/// Combine comparables into a price range and suggestion.
///
/// `suggested` is the arithmetic mean of the parsed prices, rounded to two
/// decimals, so `min <= suggested <= max` always holds.
pub fn synthesize(comparables: &[Comparable]) -> PriceEstimate {
    let prices: Vec<f64> = comparables
        .iter()
        .filter_map(|c| parse_price(&c.price))
        .collect();

    if prices.is_empty() {
        return fallback_estimate();
    }

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let suggested = ((mean * 100.0).round() / 100.0).clamp(min, max);

    PriceEstimate {
        min,
        max,
        suggested,
        currency: CURRENCY_CODE.to_string(),
        confidence: BASELINE_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparable(price: &str) -> Comparable {
        Comparable {
            title: "listing".to_string(),
            price: price.to_string(),
            source: "Shopee".to_string(),
            url: None,
        }
    }

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("350 ฿"), Some(350.0));
        assert_eq!(parse_price("35,000 ฿"), Some(35000.0));
        assert_eq!(parse_price("฿1,200.50"), Some(1200.5));
        assert_eq!(parse_price("Price not available"), None);
        assert_eq!(parse_price("350"), None);
        assert_eq!(parse_price("฿"), None);
        assert_eq!(parse_price("about 300 ฿"), None);
        assert_eq!(parse_price("-5 ฿"), None);
    }

    #[test]
    fn test_synthesize_mean_and_range() {
        let comparables = vec![comparable("350 ฿"), comparable("450 ฿"), comparable("280 ฿")];
        let estimate = synthesize(&comparables);
        assert_eq!(estimate.min, 280.0);
        assert_eq!(estimate.max, 450.0);
        assert_eq!(estimate.suggested, 360.0);
        assert_eq!(estimate.currency, "THB");
        assert_eq!(estimate.confidence, BASELINE_CONFIDENCE);
    }

    #[test]
    fn test_synthesize_skips_unparsable() {
        let comparables = vec![
            comparable("Price not available"),
            comparable("35,000 ฿"),
            comparable("38,500 ฿"),
        ];
        let estimate = synthesize(&comparables);
        assert_eq!(estimate.min, 35000.0);
        assert_eq!(estimate.max, 38500.0);
        assert_eq!(estimate.suggested, 36750.0);
    }

    #[test]
    fn test_synthesize_falls_back() {
        assert_eq!(synthesize(&[]), fallback_estimate());

        let unparsable = vec![comparable(PRICE_UNAVAILABLE), comparable("call seller")];
        let estimate = synthesize(&unparsable);
        assert_eq!(estimate.min, FALLBACK_MIN);
        assert_eq!(estimate.max, FALLBACK_MAX);
        assert_eq!(estimate.suggested, FALLBACK_SUGGESTED);
        assert_eq!(estimate.confidence, BASELINE_CONFIDENCE);
    }

    #[test]
    fn test_suggested_within_range_after_rounding() {
        let comparables = vec![comparable("0.01 ฿"), comparable("0.02 ฿"), comparable("0.02 ฿")];
        let estimate = synthesize(&comparables);
        assert!(estimate.min <= estimate.suggested && estimate.suggested <= estimate.max);
    }

    #[test]
    fn test_find_price_text_in_titles() {
        assert_eq!(
            find_price_text("MacBook Pro มือสอง 35,000 ฿ สภาพดี").as_deref(),
            Some("35,000 ฿")
        );
        assert_eq!(find_price_text("iPhone 12 ราคา ฿8,500").as_deref(), Some("8,500 ฿"));
        assert_eq!(find_price_text("Canon EOS R5 body only"), None);
        assert_eq!(find_price_text("ราคา ฿ ติดต่อผู้ขาย"), None);
    }
}
