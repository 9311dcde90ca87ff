//! Records that flow through a search: scraped rows, classified candidates,
//! ranked items and the public output shape.

use serde::{Deserialize, Serialize};

/// Match-confidence bucket assigned by [`crate::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Strict,
    Soft,
    Category,
}

/// Text read from one listing card before any parsing.
///
/// `None` means the field's element was not present on the card, which is
/// different from an element holding text without a number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// Zero-based position among the rows rendered at scan time.
    pub position: usize,
    pub element_id: Option<String>,
    pub title: Option<String>,
    pub shop_name: Option<String>,
    pub price_text: Option<String>,
    pub sold_text: Option<String>,
    pub commission_text: Option<String>,
    pub image_url: Option<String>,
}

/// Descriptor used to find one specific listing again after the page has
/// re-rendered. It is a lookup key only; results are owned by rank index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub element_id: Option<String>,
    pub title: String,
    pub shop_name: Option<String>,
    pub price: u64,
}

/// Normalized `(title, shop)` pair used for dedup and exact re-location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Identity {
    /// Lowercased, whitespace-collapsed title, joined with the shop name when
    /// one is known.
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        identity_key(&self.title, self.shop_name.as_deref())
    }
}

/// Builds the dedup key for a title/shop pair.
#[must_use]
pub fn identity_key(title: &str, shop_name: Option<&str>) -> IdentityKey {
    let norm = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    match shop_name.map(norm).filter(|s| !s.is_empty()) {
        Some(shop) => IdentityKey(format!("{}\u{1f}{shop}", norm(title))),
        None => IdentityKey(norm(title)),
    }
}

/// A scraped row that passed the price filter and was assigned a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub identity: Identity,
    pub title: String,
    pub shop_name: Option<String>,
    pub price: u64,
    pub sold_count: u64,
    pub commission: u64,
    pub image_url: Option<String>,
    pub tier: Tier,
}

/// One of the final top items. Its position in the ranked vector is its rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
    pub candidate: Candidate,
    pub affiliate_url: Option<String>,
}

impl RankedItem {
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.candidate.identity
    }
}

/// Public record returned to callers. Commission and identity stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub product_name: String,
    pub shop_name: String,
    pub price: u64,
    pub sold_count: u64,
    pub affiliate_url: Option<String>,
    pub image_url: Option<String>,
}

impl From<RankedItem> for OutputRecord {
    fn from(item: RankedItem) -> Self {
        let c = item.candidate;
        Self {
            product_name: c.title,
            shop_name: c.shop_name.unwrap_or_default(),
            price: c.price,
            sold_count: c.sold_count,
            affiliate_url: item.affiliate_url,
            image_url: c.image_url,
        }
    }
}

/// Response body shared by the HTTP surface and the CLI: either results, or
/// a domain error with an empty result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<OutputRecord>,
}

impl SearchEnvelope {
    #[must_use]
    pub fn ok(results: Vec<OutputRecord>) -> Self {
        Self {
            error: None,
            results,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            results: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_collapses_whitespace_and_case() {
        let a = identity_key("  Sabuk   Pria  KULIT ", Some("Toko  Jaya"));
        let b = identity_key("sabuk pria kulit", Some("toko jaya"));
        assert_eq!(a, b);
    }

    #[test]
    fn identity_key_without_shop_is_title_only() {
        assert_eq!(identity_key("Sabuk Pria", None).as_str(), "sabuk pria");
        assert_eq!(identity_key("Sabuk Pria", Some("  ")).as_str(), "sabuk pria");
    }

    #[test]
    fn identity_key_distinguishes_shops() {
        assert_ne!(
            identity_key("Sabuk Pria", Some("Toko A")),
            identity_key("Sabuk Pria", Some("Toko B"))
        );
    }

    #[test]
    fn output_record_hides_internal_fields() {
        let item = RankedItem {
            candidate: Candidate {
                identity: Identity {
                    element_id: Some("991".into()),
                    title: "Gesper Kulit".into(),
                    shop_name: None,
                    price: 45_000,
                },
                title: "Gesper Kulit".into(),
                shop_name: None,
                price: 45_000,
                sold_count: 12,
                commission: 3_000,
                image_url: None,
                tier: Tier::Soft,
            },
            affiliate_url: Some("https://s.example/abc".into()),
        };
        let json = serde_json::to_value(OutputRecord::from(item)).unwrap();
        assert_eq!(json["product_name"], "Gesper Kulit");
        assert_eq!(json["shop_name"], "");
        assert_eq!(json["sold_count"], 12);
        assert!(json.get("commission").is_none());
        assert!(json.get("identity").is_none());
        assert!(json["image_url"].is_null());
    }

    #[test]
    fn error_envelope_has_empty_results() {
        let json = serde_json::to_value(SearchEnvelope::error("min_price > max_price")).unwrap();
        assert_eq!(json["error"], "min_price > max_price");
        assert_eq!(json["results"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn ok_envelope_omits_error_field() {
        let json = serde_json::to_value(SearchEnvelope::ok(Vec::new())).unwrap();
        assert!(json.get("error").is_none());
    }
}
