//! Turns scraped rows into tiered candidates.
//!
//! Two paths, chosen once per query:
//!
//! - **Model path** (query has a model token): strict when
//!   [`score_model_mode`] reaches [`MatchParams::strict_score`], otherwise the
//!   row is dropped. There is no soft or category fallback on this path.
//! - **Generic path**: strict, soft or category by [`text_sim_generic`] and
//!   [`has_category_term`], otherwise dropped.
//!
//! The price filter runs before either path.

use afflink_core::SearchQuery;

use crate::matcher::{
    extract_model_token, has_category_term, score_model_mode, text_sim_generic, Lexicon,
};
use crate::parse::{parse_commission, parse_currency, parse_sold};
use crate::types::{Candidate, Identity, RawRow, Tier};

/// Thresholds for tier assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub strict_score: u32,
    /// `(min matched, min ratio)` pairs; meeting either one makes a row strict.
    pub strict_pair: (usize, f64),
    pub strict_single: (usize, f64),
    pub soft: (usize, f64),
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            strict_score: 3,
            strict_pair: (2, 0.4),
            strict_single: (1, 0.6),
            soft: (1, 0.3),
        }
    }
}

/// Candidates grouped by tier, each group in scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TieredCandidates {
    pub strict: Vec<Candidate>,
    pub soft: Vec<Candidate>,
    pub category: Vec<Candidate>,
}

impl TieredCandidates {
    #[must_use]
    pub fn len(&self) -> usize {
        self.strict.len() + self.soft.len() + self.category.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decides the tier of `title` for `query`, or `None` when it does not match.
#[must_use]
pub fn classify_title(
    lexicon: &Lexicon,
    params: &MatchParams,
    query: &str,
    title: &str,
) -> Option<Tier> {
    if !extract_model_token(query).is_empty() {
        return (score_model_mode(query, title) >= params.strict_score).then_some(Tier::Strict);
    }

    let sim = text_sim_generic(lexicon, query, title);
    let meets = |(matched, ratio): (usize, f64)| sim.matched >= matched && sim.ratio >= ratio;

    if meets(params.strict_pair) || meets(params.strict_single) {
        Some(Tier::Strict)
    } else if meets(params.soft) {
        Some(Tier::Soft)
    } else if has_category_term(lexicon, query, title) {
        Some(Tier::Category)
    } else {
        None
    }
}

/// Parses, price-filters and classifies one scanned row.
///
/// Rows without a title or without a price element are skipped. Sold and
/// commission counters are optional on a card and read as `0` when absent.
#[must_use]
pub fn classify_row(
    lexicon: &Lexicon,
    params: &MatchParams,
    query: &SearchQuery,
    row: &RawRow,
) -> Option<Candidate> {
    let title = row.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let price = parse_currency(row.price_text.as_deref()?);
    if !query.admits_price(price) {
        return None;
    }

    let tier = classify_title(lexicon, params, &query.text, title)?;
    let shop_name = row
        .shop_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(Candidate {
        identity: Identity {
            element_id: row.element_id.clone().filter(|id| !id.is_empty()),
            title: title.to_string(),
            shop_name: shop_name.clone(),
            price,
        },
        title: title.to_string(),
        shop_name,
        price,
        sold_count: row.sold_text.as_deref().map_or(0, parse_sold),
        commission: row.commission_text.as_deref().map_or(0, parse_commission),
        image_url: row.image_url.clone().filter(|u| !u.is_empty()),
        tier,
    })
}

/// Classifies every row, keeping scan order within each tier.
#[must_use]
pub fn classify_rows(
    lexicon: &Lexicon,
    params: &MatchParams,
    query: &SearchQuery,
    rows: &[RawRow],
) -> TieredCandidates {
    let mut tiers = TieredCandidates::default();
    for row in rows {
        let Some(candidate) = classify_row(lexicon, params, query, row) else {
            continue;
        };
        match candidate.tier {
            Tier::Strict => tiers.strict.push(candidate),
            Tier::Soft => tiers.soft.push(candidate),
            Tier::Category => tiers.category.push(candidate),
        }
    }
    tracing::debug!(
        query = %query.text,
        scanned = rows.len(),
        strict = tiers.strict.len(),
        soft = tiers.soft.len(),
        category = tiers.category.len(),
        "classified listing rows"
    );
    tiers
}
