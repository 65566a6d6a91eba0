//! Matching of caption fragments to subfigure labels.
//!
//! The caption-splitting collaborator hands us fragments keyed by label
//! text such as `"(a)"` or `"A."`. Subfigure labels are bare letters.
//! Both sides are normalized before comparison, and each fragment is
//! consumed by at most one subfigure.

use crate::domain::figure::{CaptionFragment, Subfigure};
use tracing::debug;

/// Strips punctuation commonly wrapped around caption labels and
/// lower-cases the rest, so `"(A)."` and `"a"` compare equal.
fn normalize(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '.' | ','))
        .collect::<String>()
        .to_lowercase()
}

/// Attaches caption fragments to subfigures by label.
///
/// Subfigures are visited in order; each takes the first unconsumed
/// fragment whose normalized label equals its own. Unmatched subfigures
/// keep an empty caption and no keywords. Fragments nothing claimed are
/// returned in their original order.
pub fn assign_captions(
    subfigures: &mut [Subfigure],
    fragments: Vec<CaptionFragment>,
) -> Vec<CaptionFragment> {
    let mut consumed = vec![false; fragments.len()];

    for subfigure in subfigures.iter_mut() {
        let target = normalize(&subfigure.subfigure_label.text);
        let matched = fragments
            .iter()
            .enumerate()
            .find(|(index, fragment)| !consumed[*index] && normalize(&fragment.label) == target);
        match matched {
            Some((index, fragment)) => {
                subfigure.caption = fragment.description.clone();
                subfigure.keywords = fragment.keywords.clone();
                consumed[index] = true;
            }
            None => {
                debug!(
                    label = %subfigure.subfigure_label.text,
                    "no caption fragment for subfigure"
                );
            }
        }
    }

    fragments
        .into_iter()
        .zip(consumed)
        .filter_map(|(fragment, used)| (!used).then_some(fragment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::figure::SubfigureLabel;
    use crate::processors::geometry::BoundingBox;

    fn subfigure(letter: &str) -> Subfigure {
        Subfigure {
            subfigure_label: SubfigureLabel {
                text: letter.to_string(),
                geometry: None,
            },
            classification: "microscopy".to_string(),
            confidence: 0.9,
            geometry: BoundingBox::new(0.0, 0.0, 100.0, 100.0).unwrap(),
            height: 100.0,
            width: 100.0,
            scale_bars: vec![],
            scale_label: None,
            nm_height: None,
            nm_width: None,
            caption: String::new(),
            keywords: vec![],
        }
    }

    fn fragment(label: &str, description: &str) -> CaptionFragment {
        CaptionFragment {
            label: label.to_string(),
            description: description.to_string(),
            keywords: vec![description.to_string()],
        }
    }

    #[test]
    fn test_punctuated_fragment_label_matches_bare_letter() {
        let mut subfigures = vec![subfigure("a")];
        let leftover = assign_captions(&mut subfigures, vec![fragment("(A).", "gold nanorods")]);
        assert_eq!(subfigures[0].caption, "gold nanorods");
        assert_eq!(subfigures[0].keywords, vec!["gold nanorods"]);
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_duplicate_fragment_labels_are_consumed_in_order() {
        let mut subfigures = vec![subfigure("a"), subfigure("a")];
        let leftover = assign_captions(
            &mut subfigures,
            vec![fragment("a", "first"), fragment("a", "second")],
        );
        assert_eq!(subfigures[0].caption, "first");
        assert_eq!(subfigures[1].caption, "second");
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_unmatched_subfigure_keeps_empty_caption() {
        let mut subfigures = vec![subfigure("b")];
        let leftover = assign_captions(&mut subfigures, vec![fragment("a", "something")]);
        assert!(subfigures[0].caption.is_empty());
        assert!(subfigures[0].keywords.is_empty());
        assert_eq!(leftover.len(), 1);
        assert_eq!(leftover[0].label, "a");
    }

    #[test]
    fn test_leftover_fragments_keep_original_order() {
        let mut subfigures = vec![subfigure("b")];
        let leftover = assign_captions(
            &mut subfigures,
            vec![
                fragment("c", "third"),
                fragment("b", "match"),
                fragment("a", "first"),
            ],
        );
        assert_eq!(subfigures[0].caption, "match");
        let labels: Vec<&str> = leftover.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["c", "a"]);
    }
}
