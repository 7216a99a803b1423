//! Lexical tokenization and Jaccard similarity over event content.
//!
//! Content is lowercased and stripped of punctuation before splitting on
//! whitespace. Short tokens and stop words are dropped. No stemming.

use std::collections::HashSet;

/// Common English filler words that carry no topical signal.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "this", "that", "with", "from", "they", "will", "would",
    "there", "their", "what", "about", "which", "when", "were", "into", "than", "then", "them",
    "these", "those", "its", "also",
];

/// Split `content` into a set of normalized tokens.
pub fn tokenize(content: &str, min_token_len: usize) -> HashSet<String> {
    let normalized: String = content
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() >= min_token_len)
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// `|A ∩ B| / |A ∪ B|`, or 0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Token-set Jaccard similarity between two pieces of content.
pub fn semantic_similarity(a: &str, b: &str, min_token_len: usize) -> f64 {
    jaccard(&tokenize(a, min_token_len), &tokenize(b, min_token_len))
}
