//! Assembled figure result types.
//!
//! This module defines the output data model of the engine: a [`Figure`]
//! holding uniquely labeled [`Subfigure`]s with their classification,
//! optional scale calibration and optional caption, plus the pool of
//! detections and caption fragments nothing claimed. Field names and
//! nesting are consumed verbatim by downstream export, overlay and
//! persistence tooling, so they are part of the contract and must not
//! be renamed.

use crate::processors::geometry::{BoundingBox, Point};
use serde::ser::SerializeSeq;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A decoded scale label attached to a scale bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleLabel {
    /// Bounding box of the label text in original-image coordinates.
    pub geometry: BoundingBox,
    /// The decoded reading, e.g. `"5 nm"`.
    pub text: String,
    /// Physical length in nanometres, truncated to two decimals.
    pub nm: f32,
    /// Confidence of the text decoding.
    pub label_confidence: f32,
    /// Confidence of the label box detection.
    pub box_confidence: f32,
}

/// A detected scale bar line, possibly paired with a decoded label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleBar {
    /// Bounding box of the bar line in original-image coordinates.
    pub geometry: BoundingBox,
    /// Length of the bar in whole pixels, taken along its width.
    pub length: f32,
    /// Confidence of the bar detection.
    pub confidence: f32,
    /// The paired label, when one was matched to this bar.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<ScaleLabel>,
}

/// The identifying label of a subfigure.
///
/// The whole-figure fallback carries text `"0"` and no geometry; its
/// geometry serializes as an empty corner list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubfigureLabel {
    /// The label text, `"a"`..`"z"` or `"0"` for the whole figure.
    pub text: String,
    /// Bounding box of the label glyph, absent for the whole-figure case.
    #[serde(
        serialize_with = "corners_or_empty",
        deserialize_with = "corners_opt",
        default
    )]
    pub geometry: Option<BoundingBox>,
}

/// One assembled subfigure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subfigure {
    /// The identifying label.
    pub subfigure_label: SubfigureLabel,
    /// Predicted content class, e.g. `"microscopy"`.
    pub classification: String,
    /// Confidence of the classification, rounded to four decimals.
    pub confidence: f32,
    /// Bounding box in original-image coordinates.
    pub geometry: BoundingBox,
    /// Height of the subfigure in pixels.
    pub height: f32,
    /// Width of the subfigure in pixels.
    pub width: f32,
    /// Scale bars claimed by this subfigure.
    pub scale_bars: Vec<ScaleBar>,
    /// Text of the calibrating scale label, set only when calibration
    /// succeeded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scale_label: Option<String>,
    /// Physical height in nanometres, truncated to one decimal.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nm_height: Option<f32>,
    /// Physical width in nanometres, truncated to one decimal.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nm_width: Option<f32>,
    /// Matched caption text, empty when no fragment matched.
    pub caption: String,
    /// Keywords of the matched caption fragment.
    pub keywords: Vec<String>,
}

/// An externally supplied caption fragment, consumed at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionFragment {
    /// The label this fragment refers to, e.g. `"(a)"`.
    pub label: String,
    /// The caption text for that label.
    pub description: String,
    /// Keywords extracted from the caption text.
    pub keywords: Vec<String>,
}

/// Detections and fragments no subfigure claimed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unassigned {
    /// Scale bars outside every subfigure.
    pub scale_bars: Vec<ScaleBar>,
    /// Decoded scale labels left without a bar to pair with.
    pub scale_labels: Vec<ScaleLabel>,
    /// Caption fragments whose label matched no subfigure.
    pub captions: Vec<CaptionFragment>,
}

/// The assembled record for one figure image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    /// Name of the source figure, typically its file name.
    pub name: String,
    /// Width of the source image in pixels.
    pub width: u32,
    /// Height of the source image in pixels.
    pub height: u32,
    /// The assembled subfigures, labels unique within the figure.
    pub subfigures: Vec<Subfigure>,
    /// Everything left unclaimed.
    pub unassigned: Unassigned,
}

fn corners_or_empty<S>(geometry: &Option<BoundingBox>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match geometry {
        Some(bbox) => bbox.serialize(serializer),
        None => serializer.serialize_seq(Some(0))?.end(),
    }
}

fn corners_opt<'de, D>(deserializer: D) -> Result<Option<BoundingBox>, D::Error>
where
    D: Deserializer<'de>,
{
    let corners: Vec<Point> = Vec::deserialize(deserializer)?;
    if corners.is_empty() {
        return Ok(None);
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
    BoundingBox::new(x1, y1, x2, y2)
        .map(Some)
        .map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_subfigure_serializes_downstream_field_names() {
        let subfigure = Subfigure {
            subfigure_label: SubfigureLabel {
                text: "a".to_string(),
                geometry: Some(bbox(10.0, 10.0, 30.0, 30.0)),
            },
            classification: "microscopy".to_string(),
            confidence: 0.9876,
            geometry: bbox(0.0, 0.0, 200.0, 100.0),
            height: 100.0,
            width: 200.0,
            scale_bars: vec![],
            scale_label: None,
            nm_height: None,
            nm_width: None,
            caption: String::new(),
            keywords: vec![],
        };
        let value = serde_json::to_value(&subfigure).unwrap();
        assert_eq!(value["subfigure_label"]["text"], "a");
        assert_eq!(value["classification"], "microscopy");
        assert_eq!(value["geometry"][0]["x"], 0);
        assert_eq!(value["geometry"][2]["y"], 100);
        // Uncalibrated subfigures omit the scale fields entirely.
        assert!(value.get("scale_label").is_none());
        assert!(value.get("nm_height").is_none());
    }

    #[test]
    fn test_whole_figure_label_geometry_is_empty_list() {
        let label = SubfigureLabel {
            text: "0".to_string(),
            geometry: None,
        };
        let value = serde_json::to_value(&label).unwrap();
        assert_eq!(value["geometry"], serde_json::json!([]));

        let back: SubfigureLabel = serde_json::from_value(value).unwrap();
        assert!(back.geometry.is_none());
    }

    #[test]
    fn test_scale_bar_label_nesting() {
        let bar = ScaleBar {
            geometry: bbox(5.0, 90.0, 105.0, 95.0),
            length: 100.0,
            confidence: 0.8,
            label: Some(ScaleLabel {
                geometry: bbox(5.0, 70.0, 40.0, 85.0),
                text: "5 um".to_string(),
                nm: 5000.0,
                label_confidence: 0.9,
                box_confidence: 0.8,
            }),
        };
        let value = serde_json::to_value(&bar).unwrap();
        assert_eq!(value["label"]["nm"], 5000.0);
        assert_eq!(value["length"], 100.0);
    }

    #[test]
    fn test_figure_round_trip() {
        let figure = Figure {
            name: "fig_001.png".to_string(),
            width: 400,
            height: 300,
            subfigures: vec![],
            unassigned: Unassigned::default(),
        };
        let json = serde_json::to_string(&figure).unwrap();
        let back: Figure = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "fig_001.png");
        assert_eq!(back.width, 400);
        assert!(back.unassigned.captions.is_empty());
    }
}
