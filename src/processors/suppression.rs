//! Greedy non-maximum suppression over scored boxes.
//!
//! Suppression runs in two flavors. The class-agnostic form operates on
//! plain scored boxes and is used for scale objects, where a bar and a
//! label overlapping each other is still a conflict. The class-aware form
//! filters raw detections by combined score, then suppresses each class
//! independently, so a subfigure boundary never shadows a label glyph.

use crate::core::traits::Detection;
use crate::processors::geometry::BoundingBox;
use itertools::Itertools;
use tracing::debug;

/// Greedy non-maximum suppression.
///
/// Boxes are visited in descending score order (ties keep their input
/// order) and a box is kept only when its IoU with every previously kept
/// box stays below `iou_threshold`. Boxes without a score are treated as
/// score zero.
///
/// # Arguments
///
/// * `boxes` - Candidate boxes, scored.
/// * `iou_threshold` - Overlap at or above which a box is suppressed.
/// * `limit` - Optional cap on the number of boxes kept.
///
/// # Returns
///
/// Indices into `boxes` of the kept boxes, in descending score order.
pub fn nms(boxes: &[BoundingBox], iou_threshold: f32, limit: Option<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| {
        let sa = boxes[a].score().unwrap_or(0.0);
        let sb = boxes[b].score().unwrap_or(0.0);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<usize> = Vec::new();
    for candidate in order {
        let suppressed = kept
            .iter()
            .any(|&k| boxes[k].iou(&boxes[candidate]) >= iou_threshold);
        if !suppressed {
            kept.push(candidate);
            if let Some(limit) = limit {
                if kept.len() >= limit {
                    break;
                }
            }
        }
    }
    kept
}

/// Filters detections by combined score and suppresses per class.
///
/// Detections whose combined score falls below `confidence_threshold`
/// are dropped first. The survivors are grouped by class index and each
/// group goes through [`nms`] on its own, so boxes of different classes
/// never suppress one another. Groups are visited in ascending class
/// order.
///
/// # Returns
///
/// Indices into `detections` of the kept detections, grouped by class.
pub fn class_aware_nms(
    detections: &[Detection],
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    let confident: Vec<usize> = (0..detections.len())
        .filter(|&i| detections[i].score() >= confidence_threshold)
        .collect();
    debug!(
        total = detections.len(),
        confident = confident.len(),
        "filtered detections by combined score"
    );

    let mut kept: Vec<usize> = Vec::new();
    let by_class = confident
        .into_iter()
        .into_group_map_by(|&i| detections[i].class_index);
    for class_index in by_class.keys().copied().sorted() {
        let members = &by_class[&class_index];
        let boxes: Vec<BoundingBox> = members
            .iter()
            .map(|&i| detections[i].bbox.scored(detections[i].score()))
            .collect();
        for local in nms(&boxes, iou_threshold, None) {
            kept.push(members[local]);
        }
    }
    kept
}
