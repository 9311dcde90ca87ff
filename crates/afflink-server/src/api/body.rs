//! Lenient request-field parsing shared by `GET` query strings and `POST`
//! bodies. Nothing here fails: unreadable input becomes an empty field set.

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

/// Decoded request fields, keyed by name.
pub(super) type Fields = Map<String, Value>;

/// Key under which a body that is neither JSON nor form pairs is kept.
pub(super) const RAW_KEY: &str = "_raw";

const QUERY_KEYS: [&str; 4] = ["product_name", "query", "q", RAW_KEY];

/// Parses a request body: a JSON object, else `k=v&...` pairs, else the
/// trimmed text under [`RAW_KEY`].
///
/// JSON that parses to something other than an object yields no fields.
pub(super) fn parse_body(bytes: &[u8]) -> Fields {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Fields::new();
    };
    let text = text.trim();
    if text.is_empty() {
        return Fields::new();
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        };
    }
    if text.contains('=') {
        return parse_pairs(text);
    }
    let mut fields = Fields::new();
    fields.insert(RAW_KEY.to_string(), Value::String(text.to_string()));
    fields
}

/// Decodes `application/x-www-form-urlencoded` pairs. `+` is a space and a
/// pair without `=` has an empty value. Any pair that does not decode to
/// UTF-8 discards the whole set.
pub(super) fn parse_pairs(text: &str) -> Fields {
    let mut fields = Fields::new();
    for pair in text.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.is_empty() {
            continue;
        }
        let (Some(key), Some(value)) = (decode(key), decode(value)) else {
            return Fields::new();
        };
        fields.insert(key, Value::String(value));
    }
    fields
}

fn decode(part: &str) -> Option<String> {
    let spaced = part.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// The search request carried by a set of fields, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ScrapeParams {
    pub text: String,
    pub min_price: u64,
    pub max_price: u64,
}

impl ScrapeParams {
    /// The first present alias among `product_name`, `query`, `q` and the
    /// raw body wins, even when empty. Prices that are not numbers become 0.
    pub(super) fn from_fields(fields: &Fields) -> Self {
        let text = QUERY_KEYS
            .iter()
            .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
            .map(value_text)
            .unwrap_or_default();
        Self {
            text: text.trim().to_string(),
            min_price: fields.get("min_price").map_or(0, coerce_price),
            max_price: fields.get("max_price").map_or(0, coerce_price),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(false) | Value::Null => String::new(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coerce_price(value: &Value) -> u64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match number {
        // `as` saturates at u64::MAX.
        Some(n) if n.is_finite() && n >= 1.0 => n.trunc() as u64,
        _ => 0,
    }
}
