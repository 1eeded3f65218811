//! Token-set string similarity.
//!
//! Both strings are reduced to sets of lower-cased alphanumeric tokens. The
//! score compares the shared tokens against each side's leftovers, so word
//! order and extra words on the longer side don't hurt. A query whose tokens
//! all appear in the document always scores 100.

use std::collections::BTreeSet;

/// Minimum score for a free-text query to match a movie
pub const MATCH_THRESHOLD: f64 = 80.0;

/// Splits into lower-cased alphanumeric tokens
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn join<'a>(tokens: impl Iterator<Item = &'a String>) -> String {
    tokens.map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Length of the longest common subsequence of two char sequences
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // Single rolling row over the shorter input
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; inner.len() + 1];

    for &x in outer {
        let mut diagonal = 0;
        for (j, &y) in inner.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if x == y {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }

    row[inner.len()]
}

/// `100 * (1 - distance / total_len)` where distance counts insertions and deletions
fn normalized(distance: usize, total_len: usize) -> f64 {
    if total_len == 0 {
        return 100.0;
    }
    100.0 * (1.0 - distance as f64 / total_len as f64)
}

/// Token-set similarity of two strings, from 0 to 100
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let shared: Vec<&String> = tokens_a.intersection(&tokens_b).collect();
    let only_a: Vec<&String> = tokens_a.difference(&tokens_b).collect();
    let only_b: Vec<&String> = tokens_b.difference(&tokens_a).collect();

    // One side is entirely contained in the other
    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let shared = join(shared.into_iter());
    let only_a: Vec<char> = join(only_a.into_iter()).chars().collect();
    let only_b: Vec<char> = join(only_b.into_iter()).chars().collect();

    let shared_len = shared.chars().count();
    let separator = usize::from(shared_len != 0);
    let shared_a_len = shared_len + separator + only_a.len();
    let shared_b_len = shared_len + separator + only_b.len();

    // "shared + a" and "shared + b" have the shared prefix in common, so their
    // indel distance is the distance between the leftovers alone.
    let leftover_distance = only_a.len() + only_b.len() - 2 * lcs_len(&only_a, &only_b);
    let mut best = normalized(leftover_distance, shared_a_len + shared_b_len);

    if shared_len != 0 {
        // "shared" is a prefix of "shared + x": distance is the appended tail
        let vs_a = normalized(separator + only_a.len(), shared_len + shared_a_len);
        let vs_b = normalized(separator + only_b.len(), shared_len + shared_b_len);
        best = best.max(vs_a).max(vs_b);
    }

    best
}

/// Returns true when `query` fuzzily matches `document`
pub fn matches(query: &str, document: &str) -> bool {
    token_set_ratio(query, document) >= MATCH_THRESHOLD
}
