//! Deterministic fact deduplication.
//!
//! Cheap and conservative: it only drops facts that normalize to the same
//! text or are near-identical rewordings. Paraphrase detection is left to the
//! memory evaluator's judge model.

use super::types::Fact;
use itertools::Itertools;
use std::collections::HashSet;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];
const MIN_COMPARABLE_LEN: usize = 10;
const CONTAINMENT_RATIO: f64 = 0.8;
const WORD_OVERLAP_RATIO: f64 = 0.7;
const MIN_SIGNIFICANT_WORD_LEN: usize = 4;

/// Lowercase, collapse whitespace, strip trailing punctuation.
pub fn normalize_fact_content(content: &str) -> String {
    content
        .to_lowercase()
        .split_whitespace()
        .join(" ")
        .trim_end_matches(TRAILING_PUNCTUATION)
        .to_string()
}

/// Compare two already-normalized contents.
pub fn are_facts_similar(a: &str, b: &str) -> bool {
    if a.len() < MIN_COMPARABLE_LEN || b.len() < MIN_COMPARABLE_LEN {
        return false;
    }

    if a.contains(b) || b.contains(a) {
        let (shorter, longer) = if a.len() <= b.len() {
            (a.len(), b.len())
        } else {
            (b.len(), a.len())
        };
        return shorter as f64 / longer as f64 >= CONTAINMENT_RATIO;
    }

    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return false;
    }

    let significant: HashSet<&str> = words_a
        .iter()
        .copied()
        .filter(|word| word.chars().count() >= MIN_SIGNIFICANT_WORD_LEN)
        .collect();
    let matches = words_b
        .iter()
        .filter(|word| word.chars().count() >= MIN_SIGNIFICANT_WORD_LEN && significant.contains(*word))
        .count();

    let avg_words = (words_a.len() + words_b.len()) / 2;
    avg_words > 0 && matches as f64 / avg_words as f64 >= WORD_OVERLAP_RATIO
}

/// Keep the first of every group of equal or near-equal facts, preserving
/// input order.
pub fn deduplicate_facts(facts: Vec<Fact>) -> Vec<Fact> {
    if facts.len() <= 1 {
        return facts;
    }

    let mut kept_normalized: Vec<String> = Vec::with_capacity(facts.len());
    let mut unique = Vec::with_capacity(facts.len());

    for fact in facts {
        let normalized = normalize_fact_content(&fact.content);
        let duplicate = kept_normalized
            .iter()
            .any(|seen| *seen == normalized || are_facts_similar(&normalized, seen));
        if !duplicate {
            kept_normalized.push(normalized);
            unique.push(fact);
        }
    }

    unique
}
