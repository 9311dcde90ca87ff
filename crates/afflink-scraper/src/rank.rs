//! Tier merge, dedup and final ordering.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::classify::TieredCandidates;
use crate::types::{Candidate, IdentityKey, RankedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankParams {
    /// Hard cap on merged candidates across all tiers.
    pub merge_cap: usize,
    /// Lower tiers are consulted only while fewer than this many are merged.
    pub min_before_fallback: usize,
    pub top_n: usize,
    /// Rows read from the listing per scan.
    pub scan_limit: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            merge_cap: 20,
            min_before_fallback: 4,
            top_n: 5,
            scan_limit: 20,
        }
    }
}

/// Merges tiers in confidence order, skipping identities already taken.
///
/// Strict candidates always go in. Soft candidates are appended only if the
/// strict tier left fewer than `min_before_fallback`, and category candidates
/// only if that is still the case afterwards.
#[must_use]
pub fn merge_tiers(tiers: TieredCandidates, params: &RankParams) -> Vec<Candidate> {
    let mut seen: HashSet<IdentityKey> = HashSet::new();
    let mut merged: Vec<Candidate> = Vec::new();

    let mut push_unique = |group: Vec<Candidate>, merged: &mut Vec<Candidate>| {
        for candidate in group {
            if merged.len() >= params.merge_cap {
                break;
            }
            if seen.insert(candidate.identity.key()) {
                merged.push(candidate);
            }
        }
    };

    push_unique(tiers.strict, &mut merged);
    if merged.len() < params.min_before_fallback {
        push_unique(tiers.soft, &mut merged);
    }
    if merged.len() < params.min_before_fallback {
        push_unique(tiers.category, &mut merged);
    }
    merged
}

/// Total order used for ranking: more sold first, then higher commission,
/// then lower price.
#[must_use]
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.sold_count
        .cmp(&a.sold_count)
        .then_with(|| b.commission.cmp(&a.commission))
        .then_with(|| a.price.cmp(&b.price))
}

/// Merges, sorts (stable) and truncates to the top `top_n` items.
#[must_use]
pub fn rank(tiers: TieredCandidates, params: &RankParams) -> Vec<RankedItem> {
    let mut merged = merge_tiers(tiers, params);
    merged.sort_by(compare_candidates);
    merged
        .into_iter()
        .take(params.top_n)
        .map(|candidate| RankedItem {
            candidate,
            affiliate_url: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Identity, Tier};

    fn cand(title: &str, sold: u64, commission: u64, price: u64, tier: Tier) -> Candidate {
        Candidate {
            identity: Identity {
                element_id: None,
                title: title.to_string(),
                shop_name: Some("Toko".to_string()),
                price,
            },
            title: title.to_string(),
            shop_name: Some("Toko".to_string()),
            price,
            sold_count: sold,
            commission,
            image_url: None,
            tier,
        }
    }

    fn strict(title: &str, sold: u64) -> Candidate {
        cand(title, sold, 0, 1_000, Tier::Strict)
    }

    fn titles(items: &[RankedItem]) -> Vec<&str> {
        items.iter().map(|i| i.candidate.title.as_str()).collect()
    }

    #[test]
    fn sold_descending_is_primary_key() {
        let tiers = TieredCandidates {
            strict: vec![strict("a", 1), strict("b", 30), strict("c", 7)],
            ..TieredCandidates::default()
        };
        let ranked = rank(tiers, &RankParams::default());
        assert_eq!(titles(&ranked), vec!["b", "c", "a"]);
    }

    #[test]
    fn equal_sold_and_commission_prefers_lower_price() {
        let a = cand("pricey", 10, 500, 90_000, Tier::Strict);
        let b = cand("cheap", 10, 500, 40_000, Tier::Strict);
        assert_eq!(compare_candidates(&b, &a), Ordering::Less);
        assert_eq!(compare_candidates(&a, &b), Ordering::Greater);
    }

    #[test]
    fn equal_sold_prefers_higher_commission() {
        let a = cand("low", 10, 100, 1_000, Tier::Strict);
        let b = cand("high", 10, 900, 99_000, Tier::Strict);
        assert_eq!(compare_candidates(&b, &a), Ordering::Less);
    }

    #[test]
    fn dedup_never_emits_same_identity_twice() {
        let tiers = TieredCandidates {
            strict: vec![strict("Sabuk Kulit", 5), strict("sabuk  KULIT", 9)],
            soft: vec![cand("Sabuk Kulit", 50, 0, 1, Tier::Soft)],
            ..TieredCandidates::default()
        };
        let ranked = rank(tiers, &RankParams::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.sold_count, 5);
    }

    #[test]
    fn same_title_different_shop_is_not_a_duplicate() {
        let mut other_shop = strict("Sabuk Kulit", 3);
        other_shop.identity.shop_name = Some("Toko Lain".into());
        let tiers = TieredCandidates {
            strict: vec![strict("Sabuk Kulit", 5), other_shop],
            ..TieredCandidates::default()
        };
        assert_eq!(rank(tiers, &RankParams::default()).len(), 2);
    }

    #[test]
    fn enough_strict_skips_lower_tiers() {
        let tiers = TieredCandidates {
            strict: (0..4).map(|i| strict(&format!("s{i}"), 1)).collect(),
            soft: vec![cand("soft-best-seller", 10_000, 0, 1, Tier::Soft)],
            category: vec![cand("cat-best-seller", 20_000, 0, 1, Tier::Category)],
        };
        let ranked = rank(tiers, &RankParams::default());
        assert!(ranked.iter().all(|i| i.candidate.tier == Tier::Strict));
    }

    #[test]
    fn few_strict_pulls_soft_then_category() {
        let tiers = TieredCandidates {
            strict: vec![strict("s0", 1)],
            soft: vec![cand("soft0", 2, 0, 1, Tier::Soft)],
            category: vec![cand("cat0", 3, 0, 1, Tier::Category)],
        };
        let ranked = rank(tiers, &RankParams::default());
        assert_eq!(titles(&ranked), vec!["cat0", "soft0", "s0"]);
    }

    #[test]
    fn soft_filling_the_quota_skips_category() {
        let tiers = TieredCandidates {
            strict: vec![strict("s0", 1)],
            soft: (0..3).map(|i| cand(&format!("soft{i}"), 1, 0, 1, Tier::Soft)).collect(),
            category: vec![cand("cat0", 99, 0, 1, Tier::Category)],
        };
        let ranked = rank(tiers, &RankParams::default());
        assert!(ranked.iter().all(|i| i.candidate.tier != Tier::Category));
    }

    #[test]
    fn merge_respects_cap_and_output_is_top_n() {
        let tiers = TieredCandidates {
            strict: (0..30).map(|i| strict(&format!("s{i}"), i)).collect(),
            ..TieredCandidates::default()
        };
        let params = RankParams::default();
        assert_eq!(merge_tiers(tiers.clone(), &params).len(), 20);
        let ranked = rank(tiers, &params);
        assert_eq!(ranked.len(), 5);
        // Only the first 20 scanned rows were merged, so s19 is the best seller.
        assert_eq!(ranked[0].candidate.title, "s19");
    }

    #[test]
    fn ranked_items_start_without_links() {
        let tiers = TieredCandidates {
            strict: vec![strict("a", 1)],
            ..TieredCandidates::default()
        };
        assert!(rank(tiers, &RankParams::default())[0].affiliate_url.is_none());
    }
}
