//! Term-frequency similarity scoring
//!
//! Used for debate novelty (how much a round repeats the previous ones) and
//! for related-debate search. No corpus statistics are kept, so vectors are
//! plain term frequencies rather than TF-IDF.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Sparse term-frequency vector
pub type TermVector = HashMap<String, f64>;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "shall", "can", "to",
    "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through", "and", "but",
    "or", "nor", "not", "so", "yet", "both", "either", "neither", "it", "its", "this", "that",
    "these", "those", "i", "you", "he", "she", "we", "they", "me", "him", "her", "us", "them",
    "my", "your",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Split into lowercase ASCII alphanumeric runs, dropping stop words and
/// single-character tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|w| w.len() > 1 && !stop_words().contains(w))
        .map(str::to_string)
        .collect()
}

/// Term-frequency vector: count / total tokens
pub fn term_vector(text: &str) -> TermVector {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return TermVector::new();
    }

    let total = tokens.len() as f64;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(word, count)| (word, count as f64 / total))
        .collect()
}

/// Cosine similarity of two sparse vectors; 0.0 if either is empty
pub fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(k, va)| b.get(k).map(|vb| va * vb))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }

    let mag_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let mag_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Cosine similarity of two texts
pub fn text_similarity(a: &str, b: &str) -> f64 {
    cosine(&term_vector(a), &term_vector(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("The cache is a B-tree, and it's 2x faster!");
        assert_eq!(tokens, vec!["cache", "tree", "2x", "faster"]);
    }

    #[test]
    fn test_term_vector_frequencies() {
        let v = term_vector("cache cache eviction policy");
        assert_eq!(v["cache"], 0.5);
        assert_eq!(v["eviction"], 0.25);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(text_similarity("", "caching strategy"), 0.0);
        assert_eq!(text_similarity("the and of", "the and of"), 0.0);
    }

    #[test]
    fn test_identical_text_scores_one() {
        let score = text_similarity("database sharding strategy", "database sharding strategy");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_text_scores_zero() {
        assert_eq!(text_similarity("rust compiler", "garden tomatoes"), 0.0);
    }

    #[test]
    fn test_partial_overlap_in_range() {
        let score = text_similarity("microservice caching layer", "caching layer design");
        assert!(score > 0.0 && score < 1.0);
    }
}
