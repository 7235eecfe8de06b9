//! # Similarity Scoring Module
//!
//! ## Purpose
//! Pluggable lexical similarity scoring for the context matcher. The matcher
//! only decides *where* to compare text; *how* the comparison is scored lives
//! behind [`SimilarityScorer`] so the algorithm and threshold policy can be
//! swapped without touching matcher control flow.
//!
//! ## Input/Output Specification
//! - **Input**: Two already-normalized text fragments
//! - **Output**: Similarity ratio in `[0.0, 1.0]`; `1.0` means identical
//!
//! The default scorer is a normalized Levenshtein ratio. The comparison is
//! purely lexical: the goal is locating the model's literal source text, not
//! judging semantic relevance.

/// Strategy interface for scoring the similarity of two text fragments
pub trait SimilarityScorer: Send + Sync {
    /// Similarity ratio in `[0.0, 1.0]`
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Default scorer: normalized Levenshtein edit-distance ratio.
///
/// `1.0 - distance / max_char_len`, which is `1.0` for identical strings and
/// `0.0` for completely disjoint ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct EditDistanceScorer;

impl SimilarityScorer for EditDistanceScorer {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }

        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let max_len = a_chars.len().max(b_chars.len());
        if max_len == 0 {
            return 1.0;
        }

        let distance = levenshtein(&a_chars, &b_chars);
        1.0 - (distance as f64 / max_len as f64)
    }
}

/// Levenshtein distance over chars, two-row dynamic programming.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let m = a.len();
    let n = b.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut current = vec![0usize; n + 1];

    for i in 1..=m {
        current[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            current[j] = (prev[j] + 1)
                .min(current[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn levenshtein_base_cases() {
        assert_eq!(levenshtein(&chars(""), &chars("")), 0);
        assert_eq!(levenshtein(&chars("abc"), &chars("")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
    }

    #[test]
    fn identical_strings_score_one() {
        let scorer = EditDistanceScorer;
        assert_eq!(scorer.similarity("the base case", "the base case"), 1.0);
        assert_eq!(scorer.similarity("", ""), 1.0);
    }

    #[test]
    fn disjoint_strings_score_low() {
        let scorer = EditDistanceScorer;
        assert!(scorer.similarity("abcd", "wxyz") < 0.25);
    }

    #[test]
    fn ratio_reflects_edit_distance() {
        let scorer = EditDistanceScorer;
        // 20 chars, 3 substitutions: ratio 1 - 3/20 = 0.85
        let a = "aaaaaaaaaaaaaaaaaaaa";
        let b = "aaaaaaaaaaaaaaaaabbb";
        let score = scorer.similarity(a, b);
        assert!(score >= 0.85, "expected inclusive boundary, got {}", score);
        assert!(score < 0.86);
    }

    #[test]
    fn scoring_is_symmetric() {
        let scorer = EditDistanceScorer;
        let a = "the while loop continues";
        let b = "a while loop continue";
        assert_eq!(scorer.similarity(a, b), scorer.similarity(b, a));
    }
}
