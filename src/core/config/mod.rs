//! Configuration management for the figure assembly engine.
//!
//! All tunables are plain serde-deserializable structs with production
//! defaults. Each struct exposes a `validate`
//! method; [`SeparationConfig::validate`] checks the whole tree and is
//! called once when an assembler is constructed.

use crate::core::errors::SeparationError;
use serde::{Deserialize, Serialize};

/// Configuration for subfigure boundary detection and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Score threshold below which detections are discarded (default: 0.0001)
    pub confidence_threshold: f32,
    /// IoU threshold for non-max suppression (default: 0.45)
    pub nms_iou_threshold: f32,
    /// Side length of the square model input canvas (default: 416)
    pub canvas_size: u32,
    /// Cell count per side of the coarse classifier grid (default: 13)
    pub grid_size: usize,
    /// Boxes with a side at or below this many pixels are noise (default: 5.0)
    pub min_box_side: f32,
    /// Label boxes with a side at or above this are not glyphs (default: 64.0)
    pub max_glyph_side: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.0001,
            nms_iou_threshold: 0.45,
            canvas_size: 416,
            grid_size: 13,
            min_box_side: 5.0,
            max_glyph_side: 64.0,
        }
    }
}

impl DetectionConfig {
    /// Validates the detection configuration.
    pub fn validate(&self) -> Result<(), SeparationError> {
        validate_unit_range("confidence_threshold", self.confidence_threshold)?;
        validate_unit_range("nms_iou_threshold", self.nms_iou_threshold)?;
        if self.grid_size == 0 {
            return Err(SeparationError::invalid_field(
                "grid_size",
                "at least 1",
                self.grid_size.to_string(),
            ));
        }
        if (self.canvas_size as usize) < self.grid_size {
            return Err(SeparationError::invalid_field(
                "canvas_size",
                format!("at least grid_size ({})", self.grid_size),
                self.canvas_size.to_string(),
            ));
        }
        if !(self.min_box_side >= 0.0) {
            return Err(SeparationError::invalid_field(
                "min_box_side",
                "a non-negative number",
                self.min_box_side.to_string(),
            ));
        }
        if !(self.max_glyph_side > self.min_box_side) {
            return Err(SeparationError::invalid_field(
                "max_glyph_side",
                format!("greater than min_box_side ({})", self.min_box_side),
                self.max_glyph_side.to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for scale-object detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Score threshold for scale bars and labels (default: 0.5)
    pub confidence_threshold: f32,
    /// IoU threshold for non-max suppression over scale objects (default: 0.4)
    pub nms_iou_threshold: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_iou_threshold: 0.4,
        }
    }
}

impl ScaleConfig {
    /// Validates the scale detection configuration.
    pub fn validate(&self) -> Result<(), SeparationError> {
        validate_unit_range("confidence_threshold", self.confidence_threshold)?;
        validate_unit_range("nms_iou_threshold", self.nms_iou_threshold)
    }
}

/// Configuration for the CTC beam-search decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Number of beams retained per timestep (default: 15)
    pub beam_width: usize,
    /// Exponent applied to bigram probabilities; kept small so the
    /// visual signal dominates the language prior (default: 0.01)
    pub lm_factor: f64,
    /// Number of decoded candidates handed to post-processing (default: 10)
    pub top_candidates: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_width: 15,
            lm_factor: 0.01,
            top_candidates: 10,
        }
    }
}

impl DecoderConfig {
    /// Validates the decoder configuration.
    pub fn validate(&self) -> Result<(), SeparationError> {
        if self.beam_width == 0 {
            return Err(SeparationError::invalid_field(
                "beam_width",
                "at least 1",
                self.beam_width.to_string(),
            ));
        }
        if self.top_candidates == 0 {
            return Err(SeparationError::invalid_field(
                "top_candidates",
                "at least 1",
                self.top_candidates.to_string(),
            ));
        }
        if !(self.lm_factor >= 0.0) {
            return Err(SeparationError::invalid_field(
                "lm_factor",
                "a non-negative number",
                self.lm_factor.to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for the figure assembly engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeparationConfig {
    /// Subfigure boundary detection and classification tunables.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Scale-object detection tunables.
    #[serde(default)]
    pub scale: ScaleConfig,
    /// CTC beam-search decoder tunables.
    #[serde(default)]
    pub decoder: DecoderConfig,
}

impl SeparationConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), SeparationError> {
        self.detection.validate()?;
        self.scale.validate()?;
        self.decoder.validate()
    }
}

fn validate_unit_range(field: &str, value: f32) -> Result<(), SeparationError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(SeparationError::invalid_field(
            field,
            "a number in [0, 1]",
            value.to_string(),
        ));
    }
    Ok(())
}
