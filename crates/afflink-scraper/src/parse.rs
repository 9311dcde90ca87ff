//! Numeric extraction from the free-text fields of a listing card.
//!
//! Card text is localized (`"Rp120.000"`, `"1.234 terjual"`,
//! `"Earn : Rp 4.500"`), so thousands separators are ignored entirely and
//! every number is read as an integer in minor currency units. Digit runs are
//! found by byte scanning; the two labelled shapes use a regex.

use std::sync::LazyLock;

use regex::Regex;

static SOLD_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d., ]+)\s*terjual").expect("valid sold regex"));

static EARN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)earn\s*:\s*rp\.?\s*([\d., ]+)").expect("valid earn regex")
});

static NUMBER_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d., ]+").expect("valid number group regex"));

/// Concatenates every digit in `text` into one integer.
///
/// `"Rp120.000"` → `120000`, `"Rp 1,250,000"` → `1250000`. Returns `0` when
/// no digit is present. Absurdly long digit strings saturate at `u64::MAX`.
#[must_use]
pub fn parse_currency(text: &str) -> u64 {
    text.bytes()
        .filter(u8::is_ascii_digit)
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}

/// Reads a sold counter such as `"1.234 terjual"`.
///
/// The number directly before the `terjual` marker wins. Without the marker
/// the largest standalone digit run is used, so `"Sold 12 (3 days)"` → `12`.
#[must_use]
pub fn parse_sold(text: &str) -> u64 {
    if let Some(caps) = SOLD_LABEL.captures(text) {
        return parse_currency(&caps[1]);
    }
    digit_runs(text).into_iter().max().unwrap_or(0)
}

/// Reads the publisher commission shown on a card.
///
/// Prefers the `"Earn : Rp 4.500"` shape; otherwise takes the last positive
/// number group in the text.
#[must_use]
pub fn parse_commission(text: &str) -> u64 {
    if let Some(caps) = EARN_LABEL.captures(text) {
        return parse_currency(&caps[1]);
    }
    NUMBER_GROUP
        .find_iter(text)
        .map(|m| parse_currency(m.as_str()))
        .filter(|n| *n > 0)
        .last()
        .unwrap_or(0)
}

/// Returns every maximal run of ASCII digits in `text`, each parsed on its own.
fn digit_runs(text: &str) -> Vec<u64> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut runs = Vec::new();
    let mut i = 0usize;

    while i < len {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < len && bytes[i].is_ascii_digit() {
                i += 1;
            }
            runs.push(parse_currency(&text[start..i]));
        } else {
            i += 1;
        }
    }
    runs
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
