//! CTC beam-search decoding of scale-label text.
//!
//! The scale-text recognizer emits a `(timesteps, vocabulary + 1)`
//! probability matrix; the trailing column is the CTC blank. Beam search
//! collapses repeated symbols and blanks into candidate strings, weakly
//! biased by a bigram language model, and post-processing turns the
//! first parseable candidate into a `(magnitude, unit)` reading.

use crate::core::config::DecoderConfig;
use crate::core::errors::SeparationError;
use crate::scale::lm::{LanguageModel, VOCABULARY};
use ndarray::Array2;
use std::collections::HashMap;
use tracing::debug;

/// One beam during decoding: probability mass of the paths that map to
/// this labeling, split by whether the path currently ends in a blank.
#[derive(Debug, Clone)]
struct BeamEntry {
    pr_blank: f64,
    pr_non_blank: f64,
    lm_score: f64,
    lm_applied: bool,
}

impl Default for BeamEntry {
    fn default() -> Self {
        Self {
            pr_blank: 0.0,
            pr_non_blank: 0.0,
            lm_score: 1.0,
            lm_applied: false,
        }
    }
}

impl BeamEntry {
    fn total(&self) -> f64 {
        self.pr_blank + self.pr_non_blank
    }
}

/// Beams sorted by `total x lm_score` descending, ties broken by the
/// labeling itself so decoding stays deterministic.
fn ranked(beams: &HashMap<Vec<usize>, BeamEntry>) -> Vec<(Vec<usize>, f64)> {
    let mut entries: Vec<(Vec<usize>, f64)> = beams
        .iter()
        .map(|(labeling, entry)| (labeling.clone(), entry.total() * entry.lm_score))
        .collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries
}

/// Runs CTC beam search over a probability matrix.
///
/// Per timestep the top `beam_width` beams by `total x lm_score` are
/// kept. Each survivor contributes a same-labeling continuation (its
/// last symbol repeated, or a blank) and one extension per vocabulary
/// symbol; extending with the beam's own last symbol only inherits the
/// blank-ending mass, which is what collapses duplicates. The language
/// model is consulted at most once per beam, when it is first created
/// by extension, as `bigram(prev, new) ^ lm_factor`. After the last
/// timestep LM scores are length-normalized.
///
/// # Arguments
///
/// * `mat` - `(timesteps, vocabulary + 1)` probabilities, blank last.
/// * `lm` - Optional bigram model; `None` decodes on visual mass alone.
/// * `config` - Beam width, LM weight and candidate count.
///
/// # Returns
///
/// Up to `top_candidates` labelings with their scores, best first, or
/// [`SeparationError::InvalidInput`] when the matrix width does not
/// match the vocabulary.
pub fn beam_search(
    mat: &Array2<f32>,
    lm: Option<&LanguageModel>,
    config: &DecoderConfig,
) -> Result<Vec<(Vec<usize>, f64)>, SeparationError> {
    let classes: Vec<char> = VOCABULARY.chars().collect();
    let blank = classes.len();
    if mat.ncols() != blank + 1 {
        return Err(SeparationError::invalid_input(format!(
            "probability matrix has {} columns, vocabulary needs {}",
            mat.ncols(),
            blank + 1
        )));
    }

    let mut last: HashMap<Vec<usize>, BeamEntry> = HashMap::new();
    last.insert(
        Vec::new(),
        BeamEntry {
            pr_blank: 1.0,
            ..Default::default()
        },
    );

    for t in 0..mat.nrows() {
        let mut curr: HashMap<Vec<usize>, BeamEntry> = HashMap::new();

        let best: Vec<Vec<usize>> = ranked(&last)
            .into_iter()
            .take(config.beam_width)
            .map(|(labeling, _)| labeling)
            .collect();

        for labeling in best {
            let parent = last[&labeling].clone();

            // Paths that leave the labeling unchanged: the last symbol
            // repeated, or a blank.
            let pr_non_blank = match labeling.last() {
                Some(&c) => parent.pr_non_blank * mat[(t, c)] as f64,
                None => 0.0,
            };
            let pr_blank = parent.total() * mat[(t, blank)] as f64;

            let entry = curr.entry(labeling.clone()).or_default();
            entry.pr_non_blank += pr_non_blank;
            entry.pr_blank += pr_blank;
            // Labeling unchanged, LM score unchanged.
            entry.lm_score = parent.lm_score;
            entry.lm_applied = true;

            for c in 0..blank {
                // A repeated symbol must cross a blank to count as new
                // output, so only the blank-ending mass carries over.
                let mass = if labeling.last() == Some(&c) {
                    parent.pr_blank
                } else {
                    parent.total()
                };
                let pr = mat[(t, c)] as f64 * mass;

                let mut extended = labeling.clone();
                extended.push(c);
                let child = curr.entry(extended).or_default();
                child.pr_non_blank += pr;

                if let Some(lm) = lm {
                    if !child.lm_applied {
                        let prev = labeling.last().map(|&i| classes[i]).unwrap_or(' ');
                        let bigram = lm.bigram(prev, classes[c]).powf(config.lm_factor);
                        child.lm_score = parent.lm_score * bigram;
                        child.lm_applied = true;
                    }
                }
            }
        }
        last = curr;
    }

    for (labeling, entry) in last.iter_mut() {
        let length = labeling.len().max(1) as f64;
        entry.lm_score = entry.lm_score.powf(1.0 / length);
    }

    Ok(ranked(&last)
        .into_iter()
        .take(config.top_candidates)
        .collect())
}

/// A decoded scale reading.
///
/// The sentinel value `(-1.0, "m", 0.0)` marks a crop whose candidates
/// all failed to parse. It is an ordinary value, not an error; callers
/// filter on [`ScaleReading::is_usable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleReading {
    /// Parsed magnitude, `-1.0` for the sentinel.
    pub magnitude: f32,
    /// Normalized unit string, one of `a, nm, um, mm, cm, m` in either
    /// case.
    pub unit: String,
    /// Score of the candidate the reading came from.
    pub confidence: f32,
}

impl ScaleReading {
    /// The reading reported when no candidate parses.
    pub fn sentinel() -> Self {
        Self {
            magnitude: -1.0,
            unit: "m".to_string(),
            confidence: 0.0,
        }
    }

    /// Whether the reading can calibrate anything. Zero is never a
    /// correct scale magnitude and negative is the sentinel.
    pub fn is_usable(&self) -> bool {
        self.magnitude > 0.0
    }

    /// The reading rendered as label text, e.g. `"5 nm"`.
    pub fn text(&self) -> String {
        format!("{} {}", self.magnitude, self.unit)
    }

    /// Physical length in nanometres, truncated to two decimals.
    pub fn nanometres(&self) -> f32 {
        let factor = match self.unit.trim().to_lowercase().as_str() {
            "a" => 0.1,
            "nm" => 1.0,
            "um" => 1_000.0,
            "mm" => 1_000_000.0,
            "cm" => 10_000_000.0,
            _ => 1_000_000_000.0,
        };
        ((self.magnitude as f64 * factor * 100.0).trunc() / 100.0) as f32
    }
}

/// Turns ranked candidates into the first parseable reading.
///
/// Each candidate is rendered as text and split into a numeric prefix
/// and a unit suffix. Single-letter unit abbreviations are expanded
/// (`n` to `nm`, `c` to `cm`, `u` to `um`) and only known units are
/// accepted. The first candidate that parses wins; if none do, the
/// sentinel is returned.
pub fn interpret(candidates: &[(Vec<usize>, f64)]) -> ScaleReading {
    let classes: Vec<char> = VOCABULARY.chars().collect();
    for (labeling, confidence) in candidates {
        let text: String = labeling.iter().map(|&i| classes[i]).collect();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != 2 {
            continue;
        }
        let Ok(magnitude) = tokens[0].parse::<f32>() else {
            continue;
        };
        let unit = match tokens[1].to_lowercase().as_str() {
            "n" => "nm".to_string(),
            "c" => "cm".to_string(),
            "u" => "um".to_string(),
            _ => tokens[1].to_string(),
        };
        if matches!(
            unit.to_lowercase().as_str(),
            "a" | "nm" | "um" | "mm" | "cm" | "m"
        ) {
            debug!(text = %text.trim(), confidence, "decoded scale reading");
            return ScaleReading {
                magnitude,
                unit,
                confidence: *confidence as f32,
            };
        }
    }
    ScaleReading::sentinel()
}

/// Decodes one probability matrix into a scale reading.
pub fn decode_scale_text(
    mat: &Array2<f32>,
    lm: Option<&LanguageModel>,
    config: &DecoderConfig,
) -> Result<ScaleReading, SeparationError> {
    let candidates = beam_search(mat, lm, config)?;
    Ok(interpret(&candidates))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(c: char) -> usize {
        VOCABULARY.find(c).unwrap()
    }

    fn blank() -> usize {
        VOCABULARY.chars().count()
    }

    fn one_hot(rows: &[usize]) -> Array2<f32> {
        let mut mat = Array2::<f32>::zeros((rows.len(), blank() + 1));
        for (t, &symbol) in rows.iter().enumerate() {
            mat[(t, symbol)] = 1.0;
        }
        mat
    }

    #[test]
    fn test_one_hot_sequence_decodes_exactly() {
        let mat = one_hot(&[idx('5'), idx(' '), idx('n'), idx('m')]);
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading.magnitude, 5.0);
        assert_eq!(reading.unit, "nm");
        assert_eq!(reading.confidence, 1.0);
    }

    #[test]
    fn test_repeated_timesteps_collapse() {
        let mat = one_hot(&[idx('5'), idx('5'), idx(' '), idx('n'), idx('m')]);
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading.magnitude, 5.0);
        assert_eq!(reading.unit, "nm");
    }

    #[test]
    fn test_blank_separates_genuine_repeats() {
        let mat = one_hot(&[idx('1'), idx(' '), idx('m'), blank(), idx('m')]);
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading.magnitude, 1.0);
        assert_eq!(reading.unit, "mm");
    }

    #[test]
    fn test_single_letter_units_expand() {
        let mat = one_hot(&[idx('5'), idx(' '), idx('u')]);
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading.unit, "um");

        let mat = one_hot(&[idx('5'), idx(' '), idx('N')]);
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading.unit, "nm");
    }

    #[test]
    fn test_unparseable_candidates_yield_sentinel() {
        let mat = one_hot(&[idx('.'), idx('.')]);
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading, ScaleReading::sentinel());
        assert!(!reading.is_usable());
    }

    #[test]
    fn test_empty_matrix_yields_sentinel() {
        let mat = Array2::<f32>::zeros((0, blank() + 1));
        let reading = decode_scale_text(&mat, None, &DecoderConfig::default()).unwrap();
        assert_eq!(reading, ScaleReading::sentinel());
    }

    #[test]
    fn test_wrong_width_matrix_is_rejected() {
        let mat = Array2::<f32>::zeros((3, 7));
        assert!(beam_search(&mat, None, &DecoderConfig::default()).is_err());
    }

    #[test]
    fn test_language_model_breaks_visual_near_tie() {
        // "5 n?" with the last step slightly favoring 'c' over 'm'.
        let mut mat = one_hot(&[idx('5'), idx(' '), idx('n')]);
        let mut row = Array2::<f32>::zeros((1, blank() + 1));
        row[(0, idx('c'))] = 0.51;
        row[(0, idx('m'))] = 0.49;
        mat.append(ndarray::Axis(0), row.view()).unwrap();

        let lm = LanguageModel::from_corpus("5 nm\n5 nm\n5 nm", VOCABULARY);
        let config = DecoderConfig {
            lm_factor: 0.5,
            ..Default::default()
        };

        let without = beam_search(&mat, None, &config).unwrap();
        assert_eq!(without[0].0, vec![idx('5'), idx(' '), idx('n'), idx('c')]);

        let with = beam_search(&mat, Some(&lm), &config).unwrap();
        assert_eq!(with[0].0, vec![idx('5'), idx(' '), idx('n'), idx('m')]);
    }

    #[test]
    fn test_nanometre_conversion_truncates() {
        let reading = ScaleReading {
            magnitude: 5.0,
            unit: "um".to_string(),
            confidence: 0.9,
        };
        assert_eq!(reading.nanometres(), 5000.0);

        let angstrom = ScaleReading {
            magnitude: 3.0,
            unit: "A".to_string(),
            confidence: 0.9,
        };
        // 0.3 nm has no exact binary form; truncation keeps two decimals.
        assert!((angstrom.nanometres() - 0.3).abs() < 0.01);
    }
}
