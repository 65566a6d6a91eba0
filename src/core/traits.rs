//! Capability traits behind which models are injected.
//!
//! The engine never executes a network itself. Detection, glyph
//! recognition, grid classification and scale-text recognition are
//! supplied by the caller through the traits below, so every assembly
//! stage stays a deterministic function of numeric inputs. All traits
//! require `Send + Sync` so a single assembler can fan out across
//! figures on a thread pool.

use crate::core::errors::SeparationError;
use crate::processors::geometry::BoundingBox;
use image::RgbImage;
use ndarray::{Array2, Array4};

/// A single raw detection in model-input space.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The detected box on the model's square input canvas.
    pub bbox: BoundingBox,
    /// Objectness score for this detection (0.0 to 1.0)
    pub objectness: f32,
    /// Confidence of the predicted class (0.0 to 1.0)
    pub class_confidence: f32,
    /// Index of the predicted class.
    pub class_index: usize,
}

impl Detection {
    /// Creates a new detection.
    pub fn new(bbox: BoundingBox, objectness: f32, class_confidence: f32, class_index: usize) -> Self {
        Self {
            bbox,
            objectness,
            class_confidence,
            class_index,
        }
    }

    /// Combined score used for filtering and suppression.
    #[inline]
    pub fn score(&self) -> f32 {
        self.objectness * self.class_confidence
    }
}

/// One predicted label glyph with its confidence.
#[derive(Debug, Clone, Copy)]
pub struct GlyphPrediction {
    /// The predicted character.
    pub letter: char,
    /// Confidence of the prediction (0.0 to 1.0)
    pub confidence: f32,
}

/// A grid of classifier predictions at the coarsest resolution.
///
/// The wrapped tensor is laid out as `[anchor, row, column, channel]`
/// where the channel axis holds `cx, cy, w, h, objectness` in canvas
/// pixels followed by one raw score per class. Finer resolutions are
/// not consulted.
#[derive(Debug, Clone)]
pub struct ClassifierGrid {
    data: Array4<f32>,
}

impl ClassifierGrid {
    /// Wraps a raw prediction tensor, validating its channel layout.
    pub fn new(data: Array4<f32>) -> Result<Self, SeparationError> {
        let shape = data.shape();
        if shape[0] == 0 || shape[1] == 0 || shape[2] == 0 {
            return Err(SeparationError::invalid_input(format!(
                "classifier grid has an empty axis: {:?}",
                shape
            )));
        }
        if shape[3] < 6 {
            return Err(SeparationError::invalid_input(format!(
                "classifier grid needs at least 6 channels (box, objectness, classes), got {}",
                shape[3]
            )));
        }
        Ok(Self { data })
    }

    /// Number of anchors per cell.
    pub fn anchors(&self) -> usize {
        self.data.shape()[0]
    }

    /// Number of grid rows.
    pub fn rows(&self) -> usize {
        self.data.shape()[1]
    }

    /// Number of grid columns.
    pub fn columns(&self) -> usize {
        self.data.shape()[2]
    }

    /// Number of classes scored at each anchor.
    pub fn classes(&self) -> usize {
        self.data.shape()[3] - 5
    }

    /// Read-only view of the underlying tensor.
    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }
}

/// An object detector producing boxes in model-input space.
///
/// Two independent instances are injected: one for subfigure
/// boundaries and one for scale objects (class 1 is a scale bar line,
/// class 2 a scale label). Both share this output shape.
pub trait Detector: Send + Sync {
    /// Side length of the square input canvas the detector letterboxes to.
    fn input_size(&self) -> u32;

    /// Runs detection on a full figure image.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, SeparationError>;
}

/// Reads a single label glyph from a cropped candidate box.
pub trait LabelRecognizer: Send + Sync {
    /// The character this recognizer emits for "not a label".
    fn reject_sentinel(&self) -> char;

    /// Predicts the glyph for one cropped candidate region.
    fn recognize(&self, crop: &RgbImage) -> Result<GlyphPrediction, SeparationError>;
}

/// Produces the coarse classification grid for a figure.
pub trait Classifier: Send + Sync {
    /// Runs the classifier over the figure, conditioned on the resolved
    /// label boxes (in original-image coordinates).
    fn classify(
        &self,
        image: &RgbImage,
        label_boxes: &[BoundingBox],
    ) -> Result<ClassifierGrid, SeparationError>;
}

/// Reads scale-label text as a per-timestep character distribution.
pub trait ScaleTextRecognizer: Send + Sync {
    /// Returns a `(timesteps, vocabulary + 1)` probability matrix for a
    /// cropped scale label; the trailing column is the CTC blank.
    fn read(&self, crop: &RgbImage) -> Result<Array2<f32>, SeparationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_classifier_grid_rejects_thin_channel_axis() {
        let data = Array4::<f32>::zeros((3, 13, 13, 5));
        assert!(ClassifierGrid::new(data).is_err());
    }

    #[test]
    fn test_classifier_grid_dimensions() {
        let data = Array4::<f32>::zeros((3, 13, 13, 20));
        let grid = ClassifierGrid::new(data).unwrap();
        assert_eq!(grid.anchors(), 3);
        assert_eq!(grid.rows(), 13);
        assert_eq!(grid.columns(), 13);
        assert_eq!(grid.classes(), 15);
    }
}
