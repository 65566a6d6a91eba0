//! Resolution of classifier grid predictions into subfigures.
//!
//! The classifier scores a coarse grid of anchor boxes over the model
//! canvas. For each resolved label, the cell under the label's center is
//! consulted, the most confident anchor there points at a refined cell,
//! and that cell's best anchor supplies the final box and class scores.
//! Only the coarsest grid resolution is consulted.

use crate::assembly::labels::ResolvedLabel;
use crate::core::config::DetectionConfig;
use crate::core::errors::SeparationError;
use crate::core::traits::ClassifierGrid;
use crate::domain::figure::{Subfigure, SubfigureLabel};
use crate::processors::geometry::BoundingBox;
use crate::processors::letterbox::Letterbox;
use ndarray::ArrayView4;

/// Content classes scored by the classifier, in channel order.
pub const CLASS_NAMES: [&str; 15] = [
    "background",
    "microscopy",
    "parent",
    "graph",
    "illustration",
    "diffraction",
    "basic_photo",
    "unclear",
    "OtherSubfigure",
    "a",
    "b",
    "c",
    "d",
    "e",
    "f",
];

fn class_name(index: usize) -> String {
    CLASS_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class_{}", index))
}

/// The outcome of anchor refinement at one grid cell.
#[derive(Debug, Clone)]
struct Refined {
    class_index: usize,
    confidence: f32,
    canvas_box: BoundingBox,
}

fn best_anchor(view: &ArrayView4<'_, f32>, anchors: usize, row: usize, col: usize) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for anchor in 0..anchors {
        let score = view[[anchor, row, col, 4]];
        if score > best_score {
            best_score = score;
            best = anchor;
        }
    }
    best
}

fn clamp_cell(value: f32, cells: usize) -> usize {
    (value as usize).min(cells - 1)
}

/// Confidence of the winning class under a softmax over the raw scores.
fn classify(scores: &[f32]) -> (usize, f32) {
    let mut class_index = 0;
    let mut best = f32::NEG_INFINITY;
    for (index, &score) in scores.iter().enumerate() {
        if score > best {
            best = score;
            class_index = index;
        }
    }
    let denom: f32 = scores.iter().map(|&s| (s - best).exp()).sum();
    let confidence = (10_000.0 / denom).round() / 10_000.0;
    (class_index, confidence)
}

/// Two-stage anchor refinement seeded at a grid cell.
///
/// The seed cell's most confident anchor predicts a box center; the
/// cell under that center is re-queried for its own best anchor, whose
/// box and class scores are final.
fn refine(
    grid: &ClassifierGrid,
    row: usize,
    col: usize,
    config: &DetectionConfig,
) -> Result<Refined, SeparationError> {
    let view = grid.view();
    let anchors = grid.anchors();
    let rows = grid.rows();
    let cols = grid.columns();
    let stride = config.canvas_size as f32 / config.grid_size as f32;

    let seed = best_anchor(&view, anchors, row, col);
    let cx = view[[seed, row, col, 0]];
    let cy = view[[seed, row, col, 1]];
    let t_col = clamp_cell(cx / stride, cols);
    let t_row = clamp_cell(cy / stride, rows);
    let anchor = best_anchor(&view, anchors, t_row, t_col);

    let cx = view[[anchor, t_row, t_col, 0]];
    let cy = view[[anchor, t_row, t_col, 1]];
    let w = view[[anchor, t_row, t_col, 2]];
    let h = view[[anchor, t_row, t_col, 3]];

    let scores: Vec<f32> = (5..view.shape()[3])
        .map(|channel| view[[anchor, t_row, t_col, channel]])
        .collect();
    let (class_index, confidence) = classify(&scores);

    let canvas_box = BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)?;
    Ok(Refined {
        class_index,
        confidence,
        canvas_box,
    })
}

fn blank_subfigure(label: SubfigureLabel, refined: &Refined, geometry: BoundingBox) -> Subfigure {
    Subfigure {
        subfigure_label: label,
        classification: class_name(refined.class_index),
        confidence: refined.confidence,
        height: geometry.height(),
        width: geometry.width(),
        geometry,
        scale_bars: Vec::new(),
        scale_label: None,
        nm_height: None,
        nm_width: None,
        caption: String::new(),
        keywords: Vec::new(),
    }
}

fn check_grid_shape(grid: &ClassifierGrid, config: &DetectionConfig) -> Result<(), SeparationError> {
    if grid.rows() != config.grid_size || grid.columns() != config.grid_size {
        return Err(SeparationError::invalid_input(format!(
            "classifier grid is {}x{}, configuration expects {}x{}",
            grid.rows(),
            grid.columns(),
            config.grid_size,
            config.grid_size
        )));
    }
    Ok(())
}

fn cell(center: f32, orig_dim: u32, scaled_dim: u32, offset: u32, canvas: u32, grid: usize) -> usize {
    let normalized = center / orig_dim as f32;
    let canvas_norm = (normalized * scaled_dim as f32 + offset as f32) / canvas as f32;
    clamp_cell(canvas_norm * grid as f32, grid)
}

/// Resolves one labeled subfigure from the classifier grid.
///
/// The seed cell is the grid cell under the label box's center after
/// mapping onto the canvas. The refined anchor's box is mapped back to
/// original-image coordinates and becomes the subfigure geometry.
pub fn resolve_labeled_subfigure(
    grid: &ClassifierGrid,
    label: &ResolvedLabel,
    letterbox: &Letterbox,
    config: &DetectionConfig,
) -> Result<Subfigure, SeparationError> {
    check_grid_shape(grid, config)?;
    let center = label.bbox.center();
    let col = cell(
        center.x,
        letterbox.orig_w,
        letterbox.scaled_w,
        letterbox.offset_x,
        letterbox.canvas,
        config.grid_size,
    );
    let row = cell(
        center.y,
        letterbox.orig_h,
        letterbox.scaled_h,
        letterbox.offset_y,
        letterbox.canvas,
        config.grid_size,
    );

    let refined = refine(grid, row, col, config)?;
    let geometry = letterbox.to_original_space(&refined.canvas_box)?;
    Ok(blank_subfigure(
        SubfigureLabel {
            text: label.letter.to_string(),
            geometry: Some(label.bbox.clone()),
        },
        &refined,
        geometry,
    ))
}

/// Resolves the whole-figure fallback when no label survived.
///
/// The subfigure spans the full image under label `"0"`; its class is
/// still read from the grid, seeded at the origin cell.
pub fn resolve_whole_figure(
    grid: &ClassifierGrid,
    width: u32,
    height: u32,
    config: &DetectionConfig,
) -> Result<Subfigure, SeparationError> {
    check_grid_shape(grid, config)?;
    let refined = refine(grid, 0, 0, config)?;
    let geometry = BoundingBox::new(0.0, 0.0, width as f32, height as f32)?;
    Ok(blank_subfigure(
        SubfigureLabel {
            text: "0".to_string(),
            geometry: None,
        },
        &refined,
        geometry,
    ))
}
