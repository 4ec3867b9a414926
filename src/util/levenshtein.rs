//! Character-level edit distance.
//!
//! These are the direct (quadratic) computations behind the Levenshtein
//! automata: a term is accepted by a compiled automaton exactly when the
//! distance computed here is within the automaton's bound.

use std::cmp::min;

/// Levenshtein distance between two strings, counted in `char`s.
///
/// Insertions, deletions and substitutions each cost one edit.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = min(min(prev[j + 1] + 1, cur[j] + 1), prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

/// Levenshtein distance, or `None` once it provably exceeds `threshold`.
pub fn levenshtein_distance_threshold(s1: &str, s2: &str, threshold: usize) -> Option<usize> {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.len().abs_diff(b.len()) > threshold {
        return None;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        let mut row_min = cur[0];
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = min(min(prev[j + 1] + 1, cur[j] + 1), prev[j] + cost);
            row_min = row_min.min(cur[j + 1]);
        }
        // Every later row is at least the minimum of this one.
        if row_min > threshold {
            return None;
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    let distance = prev[b.len()];
    (distance <= threshold).then_some(distance)
}

/// Returns true if `candidate` starts with the first `prefix_length` chars of
/// `pattern` and the rest is within `max_edits` of the rest of `pattern`.
pub fn within_edits(pattern: &str, candidate: &str, max_edits: usize, prefix_length: usize) -> bool {
    let exact = pattern.chars().count().min(prefix_length);
    let mut pattern_chars = pattern.chars();
    let mut candidate_chars = candidate.chars();
    for _ in 0..exact {
        match (pattern_chars.next(), candidate_chars.next()) {
            (Some(p), Some(c)) if p == c => {}
            _ => return false,
        }
    }

    levenshtein_distance_threshold(pattern_chars.as_str(), candidate_chars.as_str(), max_edits)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
        assert_eq!(levenshtein_distance("héllo", "hello"), 1);
    }

    #[test]
    fn test_levenshtein_distance_threshold() {
        assert_eq!(levenshtein_distance_threshold("kitten", "sitting", 3), Some(3));
        assert_eq!(levenshtein_distance_threshold("kitten", "sitting", 2), None);
        assert_eq!(levenshtein_distance_threshold("a", "abcd", 2), None);
        assert_eq!(levenshtein_distance_threshold("", "ab", 2), Some(2));
    }

    #[test]
    fn test_within_edits_with_prefix() {
        assert!(within_edits("lucene", "lucane", 1, 2));
        assert!(!within_edits("lucene", "xucene", 1, 1));
        assert!(within_edits("lu", "lu", 0, 5));
        assert!(within_edits("lu", "lux", 1, 5));
        assert!(!within_edits("lucene", "lu", 1, 2));
    }
}
