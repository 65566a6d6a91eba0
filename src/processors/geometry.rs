//! Geometric primitives for figure assembly.
//!
//! This module provides the axis-aligned bounding box used throughout the
//! engine, along with the algebra the assembly stages rely on: area, IoU,
//! strict containment, and serialization to the four-corner "labelbox"
//! form consumed downstream.

use crate::core::errors::SeparationError;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned bounding box with an optional detection score.
///
/// Invariant: `x1 <= x2` and `y1 <= y2`, with no NaN coordinate. The
/// constructor rejects boxes that violate this; callers drop the
/// offending box and keep going, never failing the whole figure.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: Option<f32>,
}

impl BoundingBox {
    /// Creates a bounding box from corner coordinates.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    ///
    /// # Returns
    ///
    /// A new `BoundingBox`, or [`SeparationError::Geometry`] when a
    /// coordinate is NaN or the corners are inverted.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self, SeparationError> {
        if x1.is_nan() || y1.is_nan() || x2.is_nan() || y2.is_nan() {
            return Err(SeparationError::geometry(format!(
                "NaN coordinate in ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        if x1 > x2 || y1 > y2 {
            return Err(SeparationError::geometry(format!(
                "inverted corners in ({}, {}, {}, {})",
                x1, y1, x2, y2
            )));
        }
        Ok(Self {
            x1,
            y1,
            x2,
            y2,
            score: None,
        })
    }

    /// Creates a bounding box carrying a detection score.
    pub fn with_score(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        score: f32,
    ) -> Result<Self, SeparationError> {
        let mut bbox = Self::new(x1, y1, x2, y2)?;
        bbox.score = Some(score);
        Ok(bbox)
    }

    /// Returns a copy of this box with the given score attached.
    pub fn scored(&self, score: f32) -> Self {
        let mut bbox = self.clone();
        bbox.score = Some(score);
        bbox
    }

    /// Minimum x-coordinate.
    #[inline]
    pub fn x1(&self) -> f32 {
        self.x1
    }

    /// Minimum y-coordinate.
    #[inline]
    pub fn y1(&self) -> f32 {
        self.y1
    }

    /// Maximum x-coordinate.
    #[inline]
    pub fn x2(&self) -> f32 {
        self.x2
    }

    /// Maximum y-coordinate.
    #[inline]
    pub fn y2(&self) -> f32 {
        self.y2
    }

    /// Detection score, if one was attached.
    #[inline]
    pub fn score(&self) -> Option<f32> {
        self.score
    }

    /// Width of the box.
    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Height of the box.
    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Length of the shorter side.
    #[inline]
    pub fn min_side(&self) -> f32 {
        self.width().min(self.height())
    }

    /// Center point of the box.
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Area of the box.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Computes the area of intersection between this box and another.
    ///
    /// # Returns
    ///
    /// The area of the intersection. Returns 0.0 if there is no overlap.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let inter_x_min = self.x1.max(other.x1);
        let inter_y_min = self.y1.max(other.y1);
        let inter_x_max = self.x2.min(other.x2);
        let inter_y_max = self.y2.min(other.y2);

        if inter_x_min >= inter_x_max || inter_y_min >= inter_y_max {
            return 0.0;
        }

        (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min)
    }

    /// Computes the Intersection over Union (IoU) between this box and another.
    ///
    /// # Returns
    ///
    /// The IoU value between 0.0 and 1.0. Returns 0.0 if there is no
    /// intersection or the union is degenerate.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_area = self.intersection_area(other);
        if inter_area <= 0.0 {
            return 0.0;
        }

        let union_area = self.area() + other.area() - inter_area;
        if union_area <= 0.0 {
            return 0.0;
        }

        inter_area / union_area
    }

    /// Checks whether this box lies strictly inside `outer` expanded by
    /// `padding` on every side.
    ///
    /// The comparison is strict: a box never contains itself, and a box
    /// sharing an edge with the container is not contained.
    pub fn is_contained_in(&self, outer: &BoundingBox, padding: f32) -> bool {
        self.x1 > outer.x1 - padding
            && self.x2 < outer.x2 + padding
            && self.y1 > outer.y1 - padding
            && self.y2 < outer.y2 + padding
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let a = self.center();
        let b = other.center();
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    /// The four corners in labelbox order.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x1, self.y1),
            Point::new(self.x1, self.y2),
            Point::new(self.x2, self.y2),
            Point::new(self.x2, self.y1),
        ]
    }
}

/// Serializes to the four-corner "labelbox" form downstream consumers
/// store: `[{x: x1, y: y1}, {x: x1, y: y2}, {x: x2, y: y2}, {x: x2, y: y1}]`
/// with coordinates truncated to whole pixels.
impl Serialize for BoundingBox {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Corner {
            x: i64,
            y: i64,
        }

        let mut seq = serializer.serialize_seq(Some(4))?;
        for corner in self.corners() {
            seq.serialize_element(&Corner {
                x: corner.x as i64,
                y: corner.y as i64,
            })?;
        }
        seq.end()
    }
}

/// Deserializes from any list of corner points, taking the bounding
/// extremes, so corner order does not matter on the way in.
impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CornerVisitor;

        impl<'de> Visitor<'de> for CornerVisitor {
            type Value = BoundingBox;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a list of corner points with x and y fields")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut corners: Vec<Point> = Vec::with_capacity(4);
                while let Some(point) = seq.next_element::<Point>()? {
                    corners.push(point);
                }
                if corners.is_empty() {
                    return Err(de::Error::invalid_length(0, &self));
                }
                let x1 = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
                let y1 = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
                let x2 = corners
                    .iter()
                    .map(|p| p.x)
                    .fold(f32::NEG_INFINITY, f32::max);
                let y2 = corners
                    .iter()
                    .map(|p| p.y)
                    .fold(f32::NEG_INFINITY, f32::max);
                BoundingBox::new(x1, y1, x2, y2).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_seq(CornerVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_rejects_nan_and_inverted() {
        assert!(BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(10.0, 0.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 10.0, 1.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_area_width_height() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 80.0).unwrap();
        assert_eq!(bbox.width(), 90.0);
        assert_eq!(bbox.height(), 60.0);
        assert_eq!(bbox.area(), 5400.0);
        assert_eq!(bbox.center(), Point::new(55.0, 50.0));
    }

    #[test]
    fn test_iou() {
        let bbox1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let bbox2 = BoundingBox::new(5.0, 5.0, 15.0, 15.0).unwrap();

        // Intersection area: 5x5 = 25
        // Union area: 100 + 100 - 25 = 175
        let iou = bbox1.iou(&bbox2);
        assert!((iou - 25.0 / 175.0).abs() < 1e-5, "IoU: {}", iou);

        // Same box should have IoU of 1.0
        let iou_same = bbox1.iou(&bbox1);
        assert!((iou_same - 1.0).abs() < 1e-5, "IoU same: {}", iou_same);

        // Non-overlapping boxes should have IoU of 0.0
        let bbox3 = BoundingBox::new(20.0, 20.0, 30.0, 30.0).unwrap();
        assert_eq!(bbox1.iou(&bbox3), 0.0);
    }

    #[test]
    fn test_containment_is_strict() {
        let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0).unwrap();

        // A box never contains itself.
        assert!(!outer.is_contained_in(&outer, 0.0));

        // Shrinking by any epsilon makes it contained.
        let shrunk = BoundingBox::new(0.001, 0.001, 99.999, 99.999).unwrap();
        assert!(shrunk.is_contained_in(&outer, 0.0));

        // Sharing an edge is not containment without padding.
        let flush = BoundingBox::new(0.0, 10.0, 50.0, 50.0).unwrap();
        assert!(!flush.is_contained_in(&outer, 0.0));
        assert!(flush.is_contained_in(&outer, 1.0));

        let outside = BoundingBox::new(110.0, 110.0, 150.0, 150.0).unwrap();
        assert!(!outside.is_contained_in(&outer, 0.0));
    }

    #[test]
    fn test_labelbox_serialization_order() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 80.0).unwrap();
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(
            json,
            r#"[{"x":10,"y":20},{"x":10,"y":80},{"x":100,"y":80},{"x":100,"y":20}]"#
        );
    }

    #[test]
    fn test_labelbox_deserialization_is_order_insensitive() {
        let json = r#"[{"x":100,"y":80},{"x":10,"y":20},{"x":10,"y":80},{"x":100,"y":20}]"#;
        let bbox: BoundingBox = serde_json::from_str(json).unwrap();
        assert_eq!(bbox.x1(), 10.0);
        assert_eq!(bbox.y1(), 20.0);
        assert_eq!(bbox.x2(), 100.0);
        assert_eq!(bbox.y2(), 80.0);
    }

    #[test]
    fn test_center_distance() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = BoundingBox::new(30.0, 40.0, 40.0, 50.0).unwrap();
        // centers (5, 5) and (35, 45): 3-4-5 triangle scaled by 10
        assert!((a.center_distance(&b) - 50.0).abs() < 1e-5);
    }
}
