//! Deterministic numeric stages shared by the assembly pipeline.
//!
//! Everything in here is a pure function of its inputs: box algebra,
//! letterbox coordinate transforms, and non-maximum suppression. No
//! model is ever consulted at this layer.

pub mod geometry;
pub mod letterbox;
pub mod suppression;

pub use geometry::{BoundingBox, Point};
pub use letterbox::Letterbox;
pub use suppression::{class_aware_nms, nms};
