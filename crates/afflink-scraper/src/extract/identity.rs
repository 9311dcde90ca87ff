//! Re-locating a ranked item among the rows a worker's page rendered.

use crate::matcher::{score_model_mode, text_sim_generic, Lexicon};
use crate::parse::parse_currency;
use crate::types::{identity_key, Identity, RawRow};

/// Fuzzy-match tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveParams {
    /// Price within this fraction of the target earns +2.
    pub near_pct: f64,
    /// Price within this fraction of the target earns +1.
    pub close_pct: f64,
    /// A fuzzy score must exceed this to be used.
    pub fuzzy_floor: f64,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            near_pct: 0.05,
            close_pct: 0.10,
            fuzzy_floor: 2.0,
        }
    }
}

/// Which row the item resolved to, and how.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    ById(usize),
    ByTitleShop(usize),
    Fuzzy { nth: usize, score: f64 },
}

impl Resolution {
    /// Index of the row among the rendered rows.
    #[must_use]
    pub fn nth(&self) -> usize {
        match *self {
            Self::ById(nth) | Self::ByTitleShop(nth) | Self::Fuzzy { nth, .. } => nth,
        }
    }
}

/// Finds the row for `identity`: element id first, then normalized
/// title/shop, then the best fuzzy score above the floor.
///
/// Rows carrying a different element id than the target are never
/// considered, so an id mismatch can't be papered over by a similar title.
#[must_use]
pub fn resolve(
    identity: &Identity,
    rows: &[RawRow],
    lexicon: &Lexicon,
    params: &ResolveParams,
) -> Option<Resolution> {
    if let Some(id) = identity.element_id.as_deref() {
        if let Some(row) = rows.iter().find(|r| r.element_id.as_deref() == Some(id)) {
            return Some(Resolution::ById(row.position));
        }
    }

    let eligible = || {
        rows.iter().filter(|r| match (&identity.element_id, &r.element_id) {
            (Some(want), Some(have)) => want == have,
            _ => true,
        })
    };

    let key = identity.key();
    if let Some(row) = eligible().find(|r| {
        r.title
            .as_deref()
            .is_some_and(|t| identity_key(t, r.shop_name.as_deref()) == key)
    }) {
        return Some(Resolution::ByTitleShop(row.position));
    }

    let mut best: Option<(usize, f64)> = None;
    for row in eligible() {
        let Some(title) = row.title.as_deref() else {
            continue;
        };
        let price = row.price_text.as_deref().map_or(0, parse_currency);
        let score = fuzzy_score(identity, title, price, lexicon, params);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((row.position, score));
        }
    }
    best.filter(|(_, score)| *score > params.fuzzy_floor)
        .map(|(nth, score)| Resolution::Fuzzy { nth, score })
}

/// `2 × model score + matched terms + ratio + price bonus`.
#[must_use]
pub fn fuzzy_score(
    identity: &Identity,
    title: &str,
    price: u64,
    lexicon: &Lexicon,
    params: &ResolveParams,
) -> f64 {
    let sim = text_sim_generic(lexicon, &identity.title, title);
    #[allow(clippy::cast_precision_loss)]
    let base = f64::from(2 * score_model_mode(&identity.title, title)) + sim.matched as f64 + sim.ratio;
    base + price_bonus(identity.price, price, params)
}

#[allow(clippy::cast_precision_loss)]
fn price_bonus(target: u64, price: u64, params: &ResolveParams) -> f64 {
    if target == 0 {
        return 0.0;
    }
    let off = target.abs_diff(price) as f64 / target as f64;
    if off <= params.near_pct {
        2.0
    } else if off <= params.close_pct {
        1.0
    } else {
        0.0
    }
}

/// `true` when two snapshots describe the same card: same element id (when
/// either has one), same title/shop key and same price text.
#[must_use]
pub fn same_row(a: &RawRow, b: &RawRow) -> bool {
    if (a.element_id.is_some() || b.element_id.is_some()) && a.element_id != b.element_id {
        return false;
    }
    let key = |r: &RawRow| {
        r.title
            .as_deref()
            .map(|t| identity_key(t, r.shop_name.as_deref()))
    };
    key(a).is_some() && key(a) == key(b) && a.price_text == b.price_text
}
