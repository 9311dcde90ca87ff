//! Query normalization and title scoring.
//!
//! Two independent scorers are provided. [`score_model_mode`] is used when the
//! query names a product model code (a token mixing letters and digits, such
//! as `"a54"` or `"rtx4060"`); [`text_sim_generic`] handles everything else by
//! counting how many synonym-expanded query terms appear in the title.

use std::collections::{HashMap, HashSet};

/// Vocabulary that drives generic matching: stopwords, synonyms, multi-word
/// phrase triggers and the category terms used by the last-resort tier.
///
/// Alternates are single tokens; the title side is tokenized before lookup,
/// so a multi-word alternate could never match and is not representable here.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub stopwords: HashSet<String>,
    pub synonyms: HashMap<String, Vec<String>>,
    /// Phrase triggers. A phrase found in the filtered query replaces its own
    /// words with the listed alternates.
    pub phrases: Vec<(String, Vec<String>)>,
    pub category_terms: HashSet<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| (*w).to_string()).collect::<Vec<_>>();

        let stopwords = [
            "dan", "dengan", "yang", "untuk", "di", "ke", "dari", "itu", "ini", "the", "of",
            "a", "an", "to", "on", "in", "by", "or", "as",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let synonyms = [
            ("sabuk", owned(&["ikat", "pinggang", "gesper", "belt"])),
            ("gesper", owned(&["sabuk", "ikat", "pinggang", "belt"])),
            ("belt", owned(&["sabuk", "ikat", "pinggang", "gesper"])),
            ("cowo", owned(&["cowok", "pria", "laki", "men"])),
            ("cowok", owned(&["cowo", "pria", "laki", "men"])),
            ("pria", owned(&["cowok", "laki", "men"])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let phrases = vec![(
            "tanpa lubang".to_string(),
            owned(&["otomatis", "ratchet", "automatic"]),
        )];

        let category_terms = ["sabuk", "gesper", "belt", "ikat", "pinggang"]
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            stopwords,
            synonyms,
            phrases,
            category_terms,
        }
    }
}

impl Lexicon {
    /// Expands stopword-filtered query terms through the phrase and synonym
    /// tables. Order is first-seen and every term appears once.
    #[must_use]
    pub fn expand_terms(&self, terms: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut push = |term: &str, out: &mut Vec<String>| {
            if seen.insert(term.to_string()) {
                out.push(term.to_string());
            }
        };

        let mut consumed = vec![false; terms.len()];
        for (phrase, alternates) in &self.phrases {
            let words: Vec<&str> = phrase.split_whitespace().collect();
            if words.is_empty() || words.len() > terms.len() {
                continue;
            }
            for start in 0..=terms.len() - words.len() {
                let hit = words
                    .iter()
                    .enumerate()
                    .all(|(offset, w)| terms[start + offset] == *w);
                if hit {
                    consumed[start..start + words.len()].fill(true);
                    for alt in alternates {
                        push(alt, &mut out);
                    }
                }
            }
        }

        for (term, used) in terms.iter().zip(&consumed) {
            if *used {
                continue;
            }
            push(term, &mut out);
            if let Some(alternates) = self.synonyms.get(term) {
                for alt in alternates {
                    push(alt, &mut out);
                }
            }
        }
        out
    }
}

/// Lowercases, replaces everything but Unicode letters, digits and spaces with
/// a space, and splits on whitespace.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Lowercases and keeps only ASCII letters and digits: `"RTX-4060 Ti"` →
/// `"rtx4060ti"`. Used for containment checks that ignore spacing.
#[must_use]
pub fn flatten(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Returns the longest query token that contains both an ASCII letter and a
/// digit, or an empty string.
///
/// Tokens are maximal runs of `[A-Za-z0-9-]`. `"iphone 13 case"` has none
/// (`"13"` is digits only); `"samsung a54 5g"` yields `"a54"` because ties keep
/// the first occurrence.
#[must_use]
pub fn extract_model_token(query: &str) -> String {
    query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .filter(|t| {
            t.chars().any(|c| c.is_ascii_alphabetic()) && t.chars().any(|c| c.is_ascii_digit())
        })
        .fold("", |best, t| if t.len() > best.len() { t } else { best })
        .to_string()
}

/// Scores a title against a query that carries a model token.
///
/// | Condition | Points |
/// |---|---|
/// | model token, as typed, is a substring of the lowercased title | +3 |
/// | flattened token is a substring of the flattened title | +3 |
/// | flattened token has ≥ 5 chars and its 5-char prefix is in the flattened title | +2 |
/// | ≥ 2 whitespace-split lowercase tokens shared by query and title | +1 |
#[must_use]
pub fn score_model_mode(query: &str, title: &str) -> u32 {
    // Case is kept: an upper-case model only earns the flattened hit.
    let model = extract_model_token(query);
    let title_lower = title.to_lowercase();
    let model_flat = flatten(&model);
    let title_flat = flatten(title);
    let mut score = 0;

    if !model.is_empty() && title_lower.contains(&model) {
        score += 3;
    }
    if !model_flat.is_empty() && title_flat.contains(&model_flat) {
        score += 3;
    }
    if model_flat.len() >= 5 && title_flat.contains(&model_flat[..5]) {
        score += 2;
    }

    let query_lower = query.to_lowercase();
    let query_tokens: HashSet<&str> = query_lower.split_whitespace().collect();
    let title_tokens: HashSet<&str> = title_lower.split_whitespace().collect();
    if query_tokens.intersection(&title_tokens).count() >= 2 {
        score += 1;
    }
    score
}

/// Outcome of [`text_sim_generic`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSim {
    /// Expanded query terms found in the title.
    pub matched: usize,
    /// `matched / max(1, expanded term count)`.
    pub ratio: f64,
}

/// Counts how many synonym-expanded query terms occur in the title's token set.
#[must_use]
pub fn text_sim_generic(lexicon: &Lexicon, query: &str, title: &str) -> TextSim {
    let terms: Vec<String> = tokenize(query)
        .into_iter()
        .filter(|t| !lexicon.stopwords.contains(t))
        .collect();
    let expanded = lexicon.expand_terms(&terms);
    let title_tokens: HashSet<String> = tokenize(title).into_iter().collect();

    let matched = expanded.iter().filter(|t| title_tokens.contains(*t)).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = matched as f64 / expanded.len().max(1) as f64;
    TextSim { matched, ratio }
}

/// `true` only when the query names a category term and the title names one
/// too (not necessarily the same one).
#[must_use]
pub fn has_category_term(lexicon: &Lexicon, query: &str, title: &str) -> bool {
    let query_has = tokenize(query)
        .iter()
        .any(|t| lexicon.category_terms.contains(t));
    query_has
        && tokenize(title)
            .iter()
            .any(|t| lexicon.category_terms.contains(t))
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;
