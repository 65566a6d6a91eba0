//! Character-bigram language model for scale-label text.
//!
//! The decoder biases its beams toward character pairs that occur in
//! real scale labels ("5 nm", "0.5 um"). The model is a plain frequency
//! table built once from a corpus bundled into the binary; it has no
//! global state and is passed by reference into the decoder.

use std::collections::HashMap;

/// The characters the scale-text recognizer can emit, in index order.
/// The CTC blank is one past the end of this set.
pub const VOCABULARY: &str = "0123456789mMcCuUnN .A";

/// Immutable character-bigram frequency table.
///
/// Probabilities are add-one smoothed over the vocabulary, so a pair
/// never seen in the corpus still gets a small positive probability and
/// the decoder never zeroes out a beam on vocabulary it has not seen.
#[derive(Debug, Clone)]
pub struct LanguageModel {
    counts: HashMap<(char, char), u32>,
    totals: HashMap<char, u32>,
    vocabulary_len: usize,
}

impl LanguageModel {
    /// Builds a bigram table from corpus text.
    ///
    /// Only adjacent pairs where both characters belong to `vocabulary`
    /// are counted; anything else in the corpus is ignored. Line breaks
    /// separate entries, so the last character of one line never pairs
    /// with the first of the next.
    pub fn from_corpus(corpus: &str, vocabulary: &str) -> Self {
        let mut counts: HashMap<(char, char), u32> = HashMap::new();
        let mut totals: HashMap<char, u32> = HashMap::new();
        for line in corpus.lines() {
            let chars: Vec<char> = line
                .chars()
                .filter(|c| vocabulary.contains(*c))
                .collect();
            for pair in chars.windows(2) {
                *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
                *totals.entry(pair[0]).or_insert(0) += 1;
            }
        }
        Self {
            counts,
            totals,
            vocabulary_len: vocabulary.chars().count(),
        }
    }

    /// Builds the model from the bundled scale-label corpus over
    /// [`VOCABULARY`].
    pub fn bundled() -> Self {
        Self::from_corpus(include_str!("corpus.txt"), VOCABULARY)
    }

    /// Probability of seeing `second` immediately after `first`.
    ///
    /// Add-one smoothed: for a fixed `first`, probabilities over the
    /// vocabulary sum to one, and unseen pairs stay strictly positive.
    pub fn bigram(&self, first: char, second: char) -> f64 {
        let total = self.totals.get(&first).copied().unwrap_or(0);
        let count = self.counts.get(&(first, second)).copied().unwrap_or(0);
        (count as f64 + 1.0) / (total as f64 + self.vocabulary_len as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_pair_beats_unseen_pair() {
        let lm = LanguageModel::from_corpus("5 nm\n5 nm\n5 nm", VOCABULARY);
        assert!(lm.bigram('n', 'm') > lm.bigram('n', 'c'));
        assert!(lm.bigram('5', ' ') > lm.bigram('5', '5'));
    }

    #[test]
    fn test_unseen_pair_is_positive() {
        let lm = LanguageModel::from_corpus("5 nm", VOCABULARY);
        assert!(lm.bigram('A', 'A') > 0.0);
        // A character absent from the corpus falls back to uniform.
        let uniform = 1.0 / VOCABULARY.chars().count() as f64;
        assert!((lm.bigram('c', '9') - uniform).abs() < 1e-12);
    }

    #[test]
    fn test_probabilities_sum_to_one_per_first_char() {
        let lm = LanguageModel::bundled();
        for first in VOCABULARY.chars() {
            let sum: f64 = VOCABULARY.chars().map(|c| lm.bigram(first, c)).sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum for {:?}: {}", first, sum);
        }
    }

    #[test]
    fn test_corpus_characters_outside_vocabulary_are_ignored() {
        let lm = LanguageModel::from_corpus("5 nm!!!", VOCABULARY);
        let clean = LanguageModel::from_corpus("5 nm", VOCABULARY);
        assert_eq!(lm.bigram('n', 'm'), clean.bigram('n', 'm'));
    }
}
