//! Price/currency and minimum-order-quantity extraction from noisy card text.
//!
//! Both extractors are pure and tolerate mixed English/Chinese fragments.

use std::sync::LazyLock;

use regex::Regex;

const AMOUNT: &str = r"\d[\d,]*(?:\.\d+)?";

static PREFIX_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let sym = r"US\$|USD|RMB|CNY|EUR|GBP|INR|\$|¥|￥|€|£|₹";
    Regex::new(&format!(
        r"(?i)({sym})\s*{AMOUNT}(?:\s*[-~–—]\s*(?:{sym})?\s*{AMOUNT})?"
    ))
    .expect("valid regex")
});
static SUFFIX_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){AMOUNT}(?:\s*[-~–—]\s*{AMOUNT})?\s*(元|RMB|CNY|USD|EUR)"
    ))
    .expect("valid regex")
});

static MOQ_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:min(?:imum)?\.?\s*order(?:\s*quantity|\s*qty)?|moq|起订量|起批量|起订|起批)\s*[:：]?\s*(?:[≥>]=?\s*)?({AMOUNT})"
    ))
    .expect("valid regex")
});
static MOQ_AT_LEAST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:≥|>=)\s*({AMOUNT})")).expect("valid regex")
});
static MOQ_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)({AMOUNT})\s*(?:(?:pieces?|pcs|units?|box(?:es)?|sets?|bags?|lots?)\b|[件个箱套包袋批])"
    ))
    .expect("valid regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Display price plus the ISO code of its currency, when one was recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceInfo {
    pub price: String,
    pub currency: Option<String>,
}

/// Finds the first currency-tagged amount in `text`.
///
/// On a match `price` is the matched fragment exactly as displayed (ranges
/// included). Without a match `price` is `text` itself and `currency` is `None`.
#[must_use]
pub fn extract_price_and_currency(text: &str) -> PriceInfo {
    find_price(text).map_or_else(
        || PriceInfo {
            price: text.to_owned(),
            currency: None,
        },
        |(price, code)| PriceInfo {
            price,
            currency: Some(code.to_owned()),
        },
    )
}

/// Like [`extract_price_and_currency`] but `None` when no tagged amount exists.
///
/// Card parsing uses this so that a whole card's text never ends up in `price`.
#[must_use]
pub(crate) fn find_price(text: &str) -> Option<(String, &'static str)> {
    if let Some(caps) = PREFIX_PRICE_RE.captures(text) {
        let code = currency_code(caps.get(1)?.as_str())?;
        return Some((caps.get(0)?.as_str().trim().to_owned(), code));
    }
    let caps = SUFFIX_PRICE_RE.captures(text)?;
    let code = currency_code(caps.get(1)?.as_str())?;
    Some((caps.get(0)?.as_str().trim().to_owned(), code))
}

fn currency_code(token: &str) -> Option<&'static str> {
    let code = match token.to_ascii_uppercase().as_str() {
        "US$" | "$" | "USD" => "USD",
        "¥" | "￥" | "RMB" | "CNY" | "元" => "CNY",
        "€" | "EUR" => "EUR",
        "£" | "GBP" => "GBP",
        "₹" | "INR" => "INR",
        _ => return None,
    };
    Some(code)
}

/// Returns the minimum order quantity as `"MOQ N"`, or `None`.
///
/// Patterns are tried in order: an explicit keyword (`Min. Order`, `MOQ`,
/// `起订量` ...), then `≥ N` / `>= N`, then a number directly followed by a
/// unit word.
#[must_use]
pub fn extract_moq(text: &str) -> Option<String> {
    [&*MOQ_KEYWORD_RE, &*MOQ_AT_LEAST_RE, &*MOQ_UNIT_RE]
        .into_iter()
        .find_map(|re| {
            let caps = re.captures(text)?;
            parse_quantity(caps.get(1)?.as_str())
        })
        .map(|qty| format!("MOQ {qty}"))
}

/// Parses `1,000` style numbers; rejects non-finite and non-positive values.
fn parse_quantity(raw: &str) -> Option<String> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    if value.fract() == 0.0 {
        Some(format!("{value:.0}"))
    } else {
        Some(value.to_string())
    }
}

/// Collapses runs of whitespace into single spaces and trims.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moq_keyword_form() {
        assert_eq!(extract_moq("Min Order: 10 Piece").as_deref(), Some("MOQ 10"));
        assert_eq!(
            extract_moq("Minimum order quantity: 1,000 pcs").as_deref(),
            Some("MOQ 1000")
        );
        assert_eq!(extract_moq("MOQ：50").as_deref(), Some("MOQ 50"));
    }

    #[test]
    fn moq_at_least_form() {
        assert_eq!(extract_moq("≥ 500 units").as_deref(), Some("MOQ 500"));
        assert_eq!(extract_moq(">=3").as_deref(), Some("MOQ 3"));
    }

    #[test]
    fn moq_bare_number_with_unit() {
        assert_eq!(extract_moq("US$ 1.20 | 200 sets").as_deref(), Some("MOQ 200"));
        assert_eq!(extract_moq("2 boxes").as_deref(), Some("MOQ 2"));
    }

    #[test]
    fn moq_chinese_forms() {
        assert_eq!(extract_moq("起订量：100件").as_deref(), Some("MOQ 100"));
        assert_eq!(extract_moq("¥3.50 2个起批").as_deref(), Some("MOQ 2"));
        assert_eq!(extract_moq("起批 ≥ 5").as_deref(), Some("MOQ 5"));
    }

    #[test]
    fn moq_absent() {
        assert_eq!(extract_moq("random text, no quantity"), None);
        assert_eq!(extract_moq(""), None);
    }

    #[test]
    fn moq_rejects_non_finite_numbers() {
        let huge = format!("MOQ: {}", "9".repeat(400));
        assert_eq!(extract_moq(&huge), None);
    }

    #[test]
    fn moq_keeps_fractional_quantities() {
        assert_eq!(extract_moq("Min. order: 0.5 lot").as_deref(), Some("MOQ 0.5"));
    }

    #[test]
    fn price_symbol_prefixed() {
        let info = extract_price_and_currency("US$ 12.50");
        assert_eq!(info.price, "US$ 12.50");
        assert_eq!(info.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn price_range_is_kept_whole() {
        let info = extract_price_and_currency("Lamp US$1.20-3.50 / Piece");
        assert_eq!(info.price, "US$1.20-3.50");
        assert_eq!(info.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn price_code_prefixed_and_yuan_suffixed() {
        let rmb = extract_price_and_currency("RMB 3.20 - 4.80");
        assert_eq!(rmb.price, "RMB 3.20 - 4.80");
        assert_eq!(rmb.currency.as_deref(), Some("CNY"));

        let yuan = extract_price_and_currency("价格 12.5元 起");
        assert_eq!(yuan.price, "12.5元");
        assert_eq!(yuan.currency.as_deref(), Some("CNY"));

        let fullwidth = extract_price_and_currency("￥25.00");
        assert_eq!(fullwidth.currency.as_deref(), Some("CNY"));

        let euro = extract_price_and_currency("€ 1,299.00");
        assert_eq!(euro.price, "€ 1,299.00");
        assert_eq!(euro.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn price_without_currency_returns_raw_text() {
        let info = extract_price_and_currency("no price here");
        assert_eq!(info.price, "no price here");
        assert_eq!(info.currency, None);
    }

    #[test]
    fn collapse_whitespace_joins_lines() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
