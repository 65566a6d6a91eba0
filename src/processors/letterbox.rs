//! Letterbox mapping between original-image and model-input space.
//!
//! Detectors run on a fixed square canvas. The source image is scaled to
//! fit while preserving aspect ratio and centered with padding on the
//! short axis. [`Letterbox`] records that placement and converts boxes in
//! both directions.

use crate::core::errors::SeparationError;
use crate::processors::geometry::BoundingBox;

/// Placement of an image on a square model-input canvas.
///
/// All fields are whole pixels. The scaled image occupies the rectangle
/// `(offset_x, offset_y)` to `(offset_x + scaled_w, offset_y + scaled_h)`
/// on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    /// Width of the original image.
    pub orig_w: u32,
    /// Height of the original image.
    pub orig_h: u32,
    /// Side length of the square canvas.
    pub canvas: u32,
    /// Width of the image after aspect-preserving scaling.
    pub scaled_w: u32,
    /// Height of the image after aspect-preserving scaling.
    pub scaled_h: u32,
    /// Horizontal padding on the left of the scaled image.
    pub offset_x: u32,
    /// Vertical padding above the scaled image.
    pub offset_y: u32,
}

impl Letterbox {
    /// Computes the letterbox placement for an image on a square canvas.
    ///
    /// The long side is scaled to `canvas` and the short side is scaled
    /// proportionally with truncation, then clamped to at least one
    /// pixel. Padding splits evenly, rounding down on the leading side.
    ///
    /// # Arguments
    ///
    /// * `orig_w` - Width of the original image in pixels.
    /// * `orig_h` - Height of the original image in pixels.
    /// * `canvas` - Side length of the square model input.
    ///
    /// # Returns
    ///
    /// The placement, or [`SeparationError::InvalidInput`] when a
    /// dimension is zero.
    pub fn new(orig_w: u32, orig_h: u32, canvas: u32) -> Result<Self, SeparationError> {
        if orig_w == 0 || orig_h == 0 {
            return Err(SeparationError::invalid_input(format!(
                "image has an empty dimension: {}x{}",
                orig_w, orig_h
            )));
        }
        if canvas == 0 {
            return Err(SeparationError::invalid_input(
                "letterbox canvas must be at least 1 pixel",
            ));
        }

        let aspect = orig_w as f32 / orig_h as f32;
        let (scaled_w, scaled_h) = if aspect < 1.0 {
            ((canvas as f32 * aspect) as u32, canvas)
        } else {
            (canvas, (canvas as f32 / aspect) as u32)
        };
        let scaled_w = scaled_w.max(1);
        let scaled_h = scaled_h.max(1);

        Ok(Self {
            orig_w,
            orig_h,
            canvas,
            scaled_w,
            scaled_h,
            offset_x: (canvas - scaled_w) / 2,
            offset_y: (canvas - scaled_h) / 2,
        })
    }

    /// Maps a box from original-image space onto the canvas.
    ///
    /// The score, if any, is carried through unchanged. No clamping is
    /// applied in this direction.
    pub fn to_model_space(&self, bbox: &BoundingBox) -> Result<BoundingBox, SeparationError> {
        let sx = self.scaled_w as f32 / self.orig_w as f32;
        let sy = self.scaled_h as f32 / self.orig_h as f32;
        let dx = self.offset_x as f32;
        let dy = self.offset_y as f32;

        let mapped = BoundingBox::new(
            bbox.x1() * sx + dx,
            bbox.y1() * sy + dy,
            bbox.x2() * sx + dx,
            bbox.y2() * sy + dy,
        )?;
        Ok(match bbox.score() {
            Some(score) => mapped.scored(score),
            None => mapped,
        })
    }

    /// Maps a box from the canvas back to original-image space.
    ///
    /// The width and height of the box are rescaled first, then the top
    /// left corner, so rounding on the corner never changes the box
    /// size. Corners are clamped into the image: minimum corners to
    /// `[0, dim - 1]` and maximum corners to `[0, dim]`.
    pub fn to_original_space(&self, bbox: &BoundingBox) -> Result<BoundingBox, SeparationError> {
        let w = self.orig_w as f32;
        let h = self.orig_h as f32;
        let sx = w / self.scaled_w as f32;
        let sy = h / self.scaled_h as f32;

        let box_w = bbox.width() * sx;
        let box_h = bbox.height() * sy;
        let x1 = (bbox.x1() - self.offset_x as f32) * sx;
        let y1 = (bbox.y1() - self.offset_y as f32) * sy;

        let x1 = x1.max(0.0).min(w - 1.0);
        let y1 = y1.max(0.0).min(h - 1.0);
        let x2 = (x1 + box_w).max(0.0).min(w);
        let y2 = (y1 + box_h).max(0.0).min(h);

        let mapped = BoundingBox::new(x1, y1, x2, y2)?;
        Ok(match bbox.score() {
            Some(score) => mapped.scored(score),
            None => mapped,
        })
    }
}
