//! Resolution of label glyphs into a consistent set of subfigure labels.
//!
//! Every boundary candidate gets a glyph prediction from the injected
//! recognizer. This module turns that raw stream into at most one box
//! per letter, drops rejects and implausible letters, and keeps only
//! boxes small enough to actually be a printed label glyph.

use crate::core::config::DetectionConfig;
use crate::core::traits::GlyphPrediction;
use crate::processors::geometry::BoundingBox;
use tracing::{debug, warn};

/// One boundary candidate with its glyph prediction.
#[derive(Debug, Clone)]
pub struct LabelCandidate {
    /// Candidate box in original-image coordinates.
    pub bbox: BoundingBox,
    /// Class confidence of the box detection.
    pub box_confidence: f32,
    /// Glyph prediction for the cropped box.
    pub glyph: GlyphPrediction,
}

/// A resolved subfigure label: one letter, one box.
#[derive(Debug, Clone)]
pub struct ResolvedLabel {
    /// The label letter, `'a'..='z'`.
    pub letter: char,
    /// Box of the label glyph in original-image coordinates.
    pub bbox: BoundingBox,
    /// Combined box and glyph confidence.
    pub confidence: f32,
}

/// Resolves glyph predictions into unique subfigure labels.
///
/// Candidates predicting `sentinel` are rejects and dropped first. When
/// several candidates read as the same letter, the one with the highest
/// combined confidence (box times glyph) wins, keeping the letter's
/// first-seen position in the output order. A letter is then kept only
/// if its zero-based alphabet index is plausible for the number of
/// surviving letters (index below survivors plus two) and its box is
/// strictly smaller than the glyph size cap on both sides.
pub fn assemble_labels(
    candidates: &[LabelCandidate],
    sentinel: char,
    config: &DetectionConfig,
) -> Vec<ResolvedLabel> {
    let mut letters: Vec<char> = Vec::new();
    let mut best: Vec<(f32, BoundingBox)> = Vec::new();

    for candidate in candidates {
        let letter = candidate.glyph.letter;
        if letter == sentinel {
            continue;
        }
        if !letter.is_ascii_lowercase() {
            warn!(%letter, "recognizer emitted a non-letter glyph, dropping");
            continue;
        }
        let confidence = candidate.box_confidence * candidate.glyph.confidence;
        match letters.iter().position(|&seen| seen == letter) {
            Some(index) => {
                if confidence > best[index].0 {
                    best[index] = (confidence, candidate.bbox.clone());
                }
            }
            None => {
                letters.push(letter);
                best.push((confidence, candidate.bbox.clone()));
            }
        }
    }

    let survivors = letters.len();
    let mut resolved = Vec::new();
    for (letter, (confidence, bbox)) in letters.into_iter().zip(best) {
        let index = (letter as usize) - ('a' as usize);
        if index >= survivors + 2 {
            debug!(%letter, survivors, "letter index implausible for label set, dropping");
            continue;
        }
        if bbox.width() < config.max_glyph_side && bbox.height() < config.max_glyph_side {
            resolved.push(ResolvedLabel {
                letter,
                bbox,
                confidence,
            });
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(letter: char, box_conf: f32, glyph_conf: f32) -> LabelCandidate {
        LabelCandidate {
            bbox: BoundingBox::new(0.0, 0.0, 20.0, 20.0).unwrap(),
            box_confidence: box_conf,
            glyph: GlyphPrediction {
                letter,
                confidence: glyph_conf,
            },
        }
    }

    fn candidate_with_box(letter: char, bbox: BoundingBox) -> LabelCandidate {
        LabelCandidate {
            bbox,
            box_confidence: 0.9,
            glyph: GlyphPrediction {
                letter,
                confidence: 0.9,
            },
        }
    }

    #[test]
    fn test_sentinel_predictions_are_dropped() {
        let candidates = vec![candidate('z', 0.9, 0.9), candidate('a', 0.8, 0.8)];
        let resolved = assemble_labels(&candidates, 'z', &DetectionConfig::default());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].letter, 'a');
    }

    #[test]
    fn test_duplicate_letters_keep_highest_combined_confidence() {
        let weak = LabelCandidate {
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
            box_confidence: 0.5,
            glyph: GlyphPrediction {
                letter: 'a',
                confidence: 0.5,
            },
        };
        let strong = LabelCandidate {
            bbox: BoundingBox::new(100.0, 0.0, 110.0, 10.0).unwrap(),
            box_confidence: 0.9,
            glyph: GlyphPrediction {
                letter: 'a',
                confidence: 0.9,
            },
        };
        // Either arrival order must pick the stronger box.
        for candidates in [vec![weak.clone(), strong.clone()], vec![strong, weak]] {
            let resolved = assemble_labels(&candidates, 'z', &DetectionConfig::default());
            assert_eq!(resolved.len(), 1);
            assert_eq!(resolved[0].bbox.x1(), 100.0);
            assert!((resolved[0].confidence - 0.81).abs() < 1e-5);
        }
    }

    #[test]
    fn test_implausible_letter_index_is_dropped() {
        // Two survivors admit indices 0..3, so 'g' (index 6) is noise.
        let candidates = vec![candidate('a', 0.9, 0.9), candidate('g', 0.9, 0.9)];
        let resolved = assemble_labels(&candidates, 'z', &DetectionConfig::default());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].letter, 'a');
    }

    #[test]
    fn test_plausible_gap_is_kept() {
        // 'c' has index 2, below survivors (2) + 2.
        let candidates = vec![candidate('a', 0.9, 0.9), candidate('c', 0.9, 0.9)];
        let resolved = assemble_labels(&candidates, 'z', &DetectionConfig::default());
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_oversized_glyph_box_is_dropped() {
        let big = candidate_with_box('a', BoundingBox::new(0.0, 0.0, 64.0, 20.0).unwrap());
        let small = candidate_with_box('b', BoundingBox::new(0.0, 0.0, 63.0, 20.0).unwrap());
        let resolved = assemble_labels(&[big, small], 'z', &DetectionConfig::default());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].letter, 'b');
    }

    #[test]
    fn test_output_preserves_first_seen_order() {
        let candidates = vec![
            candidate('b', 0.9, 0.9),
            candidate('a', 0.9, 0.9),
            candidate('c', 0.9, 0.9),
        ];
        let resolved = assemble_labels(&candidates, 'z', &DetectionConfig::default());
        let letters: Vec<char> = resolved.iter().map(|r| r.letter).collect();
        assert_eq!(letters, vec!['b', 'a', 'c']);
    }
}
